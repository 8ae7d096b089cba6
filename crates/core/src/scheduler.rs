use chrono::{DateTime, Duration, Utc};

use crate::model::{
    CardStatus, GRADUATION_INTERVAL_DAYS, MIN_EASE_FACTOR, ReviewLog, ReviewQuality, SrsCard,
};

/// Upper bound on a scheduled interval, keeping due dates representable.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

//
// ─── APPLIED REVIEW ────────────────────────────────────────────────────────────
//

/// Outcome of applying a review: the updated card and a log entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReview {
    pub card: SrsCard,
    pub log: ReviewLog,
}

impl AppliedReview {
    /// Whether the review counts as a correct answer for performance stats.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.log.quality.is_pass()
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// SM-2 scheduler.
///
/// On a pass (quality ≥ 3) the interval steps 1 → 6 → `round(interval × ease)`
/// and `repetitions` grows; on a fail both reset (`repetitions = 0`,
/// `interval = 1`). The ease factor moves on every review and never drops
/// below 1.3.
///
/// # Examples
///
/// ```
/// # use prep_core::scheduler::Scheduler;
/// # use prep_core::model::{CardId, QuestionId, ReviewQuality, SrsCard, UserId};
/// let now = chrono::Utc::now();
/// let card = SrsCard::new(CardId::new(1), UserId::new(1), QuestionId::new(1), now);
///
/// let applied = Scheduler::new().apply_review(&card, ReviewQuality::new(5)?, now);
/// assert_eq!(applied.card.interval_days, 1);
/// assert_eq!(applied.card.repetitions, 1);
/// # Ok::<(), prep_core::model::ReviewError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// SM-2 ease update: `max(1.3, ease + 0.1 − (5−q)(0.08 + (5−q)·0.02))`.
    #[must_use]
    pub fn next_ease(ease_factor: f64, quality: ReviewQuality) -> f64 {
        let miss = f64::from(5 - quality.value());
        (ease_factor + 0.1 - miss * (0.08 + miss * 0.02)).max(MIN_EASE_FACTOR)
    }

    /// Interval after a successful recall, computed with the pre-review ease.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn passed_interval(card: &SrsCard) -> u32 {
        match card.repetitions {
            0 => 1,
            1 => 6,
            _ => {
                let grown = (f64::from(card.interval_days) * card.ease_factor).round();
                (grown.min(f64::from(MAX_INTERVAL_DAYS)) as u32).max(1)
            }
        }
    }

    /// Apply a review to `card` and return the updated card plus log entry.
    ///
    /// The input card is left untouched so callers can persist the result
    /// against the card's current revision.
    #[must_use]
    pub fn apply_review(
        &self,
        card: &SrsCard,
        quality: ReviewQuality,
        reviewed_at: DateTime<Utc>,
    ) -> AppliedReview {
        let (interval_days, repetitions) = if quality.is_pass() {
            (Self::passed_interval(card), card.repetitions.saturating_add(1))
        } else {
            (1, 0)
        };

        let status = if card.status == CardStatus::Graduated
            || interval_days >= GRADUATION_INTERVAL_DAYS
        {
            CardStatus::Graduated
        } else if repetitions == 0 {
            CardStatus::Learning
        } else {
            CardStatus::Review
        };

        let ease_factor = Self::next_ease(card.ease_factor, quality);

        let updated = SrsCard {
            ease_factor,
            interval_days,
            repetitions,
            next_review_at: reviewed_at + Duration::days(i64::from(interval_days)),
            last_reviewed_at: Some(reviewed_at),
            status,
            revision: card.revision.wrapping_add(1),
            ..card.clone()
        };

        let log = ReviewLog {
            card_id: card.id,
            quality,
            reviewed_at,
            previous_interval_days: card.interval_days,
            interval_days,
            ease_factor,
        };

        AppliedReview { card: updated, log }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
