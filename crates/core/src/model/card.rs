use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CardId, QuestionId, UserId};

/// Lowest ease factor a card can reach.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Ease factor of a fresh card.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;
/// Interval (in days) at which a card graduates.
pub const GRADUATION_INTERVAL_DAYS: u32 = 21;

//
// ─── CARD STATUS ───────────────────────────────────────────────────────────────
//

/// Lifecycle of a spaced-repetition card.
///
/// `Graduated` is terminal: no review moves a card out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    New,
    Learning,
    Review,
    Graduated,
}

impl CardStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::New => "new",
            CardStatus::Learning => "learning",
            CardStatus::Review => "review",
            CardStatus::Graduated => "graduated",
        }
    }

    /// Parse the storage representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(CardStatus::New),
            "learning" => Some(CardStatus::Learning),
            "review" => Some(CardStatus::Review),
            "graduated" => Some(CardStatus::Graduated),
            _ => None,
        }
    }
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CardError {
    #[error("ease factor {0} is below the {MIN_EASE_FACTOR} floor")]
    EaseBelowFloor(f64),
    #[error("invalid persisted card state: {0}")]
    InvalidPersistedState(String),
}

/// Spaced-repetition state of one question for one learner.
///
/// `revision` increments on every persisted change and backs optimistic
/// concurrency in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsCard {
    pub id: CardId,
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub status: CardStatus,
    pub revision: u32,
}

impl SrsCard {
    /// A fresh card, due immediately.
    #[must_use]
    pub fn new(id: CardId, user_id: UserId, question_id: QuestionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            question_id,
            ease_factor: INITIAL_EASE_FACTOR,
            interval_days: 0,
            repetitions: 0,
            next_review_at: now,
            last_reviewed_at: None,
            status: CardStatus::New,
            revision: 0,
        }
    }

    /// Rehydrate a card from storage.
    ///
    /// # Errors
    ///
    /// Returns `CardError` if the stored ease factor violates the floor or a
    /// never-reviewed card claims a non-new status.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CardId,
        user_id: UserId,
        question_id: QuestionId,
        ease_factor: f64,
        interval_days: u32,
        repetitions: u32,
        next_review_at: DateTime<Utc>,
        last_reviewed_at: Option<DateTime<Utc>>,
        status: CardStatus,
        revision: u32,
    ) -> Result<Self, CardError> {
        if !ease_factor.is_finite() || ease_factor < MIN_EASE_FACTOR - 1e-9 {
            return Err(CardError::EaseBelowFloor(ease_factor));
        }
        if last_reviewed_at.is_none() && status != CardStatus::New {
            return Err(CardError::InvalidPersistedState(format!(
                "card {id} has status {} but was never reviewed",
                status.as_str()
            )));
        }
        Ok(Self {
            id,
            user_id,
            question_id,
            ease_factor,
            interval_days,
            repetitions,
            next_review_at,
            last_reviewed_at,
            status,
            revision,
        })
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status != CardStatus::Graduated && self.next_review_at <= now
    }

    #[must_use]
    pub fn belongs_to(&self, user: UserId) -> bool {
        self.user_id == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn card() -> SrsCard {
        SrsCard::new(CardId::new(1), UserId::new(1), QuestionId::new(1), fixed_now())
    }

    #[test]
    fn fresh_card_defaults() {
        let c = card();
        assert_eq!(c.status, CardStatus::New);
        assert_eq!(c.interval_days, 0);
        assert_eq!(c.repetitions, 0);
        assert!((c.ease_factor - 2.5).abs() < f64::EPSILON);
        assert!(c.is_due(fixed_now()));
    }

    #[test]
    fn graduated_cards_are_never_due() {
        let mut c = card();
        c.status = CardStatus::Graduated;
        assert!(!c.is_due(fixed_now() + Duration::days(365)));
    }

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            CardStatus::New,
            CardStatus::Learning,
            CardStatus::Review,
            CardStatus::Graduated,
        ] {
            assert_eq!(CardStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(CardStatus::parse("relearning"), None);
    }

    #[test]
    fn from_persisted_rejects_low_ease() {
        let err = SrsCard::from_persisted(
            CardId::new(1),
            UserId::new(1),
            QuestionId::new(1),
            1.0,
            1,
            1,
            fixed_now(),
            Some(fixed_now()),
            CardStatus::Review,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, CardError::EaseBelowFloor(_)));
    }

    #[test]
    fn from_persisted_rejects_reviewed_status_without_review() {
        let err = SrsCard::from_persisted(
            CardId::new(1),
            UserId::new(1),
            QuestionId::new(1),
            2.5,
            1,
            1,
            fixed_now(),
            None,
            CardStatus::Review,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, CardError::InvalidPersistedState(_)));
    }
}
