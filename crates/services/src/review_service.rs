use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use prep_core::{
    model::{AnswerOutcome, CardId, QuestionId, ReviewLog, ReviewQuality, SrsCard, UserId},
    scheduler::Scheduler,
    time::Clock,
};
use storage::repository::{ReviewPersistence, SrsCardRepository};

use crate::error::ReviewServiceError;

/// A persisted review: the card as stored afterwards and its log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub card: SrsCard,
    pub log: ReviewLog,
}

impl ReviewOutcome {
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.log.quality.is_pass()
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Applies SM-2 reviews to a learner's cards and persists them.
#[derive(Clone)]
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
    cards: Arc<dyn SrsCardRepository>,
    reviews: Arc<dyn ReviewPersistence>,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        clock: Clock,
        cards: Arc<dyn SrsCardRepository>,
        reviews: Arc<dyn ReviewPersistence>,
    ) -> Self {
        Self {
            clock,
            scheduler: Scheduler::new(),
            cards,
            reviews,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Grade a recall of `card_id` by `user` and persist the new schedule.
    ///
    /// The card, its review log and the matching performance update are
    /// written together, and only if the card has not changed since it was
    /// loaded.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Quality` if `quality` is outside `0..=5`.
    /// Returns `ReviewServiceError::NotOwner` if the card belongs to someone else.
    /// Returns `ReviewServiceError::Storage` if the card is missing, was
    /// changed concurrently (`StorageError::Conflict`, retryable), or the write fails.
    pub async fn submit_srs_review(
        &self,
        user: UserId,
        card_id: CardId,
        quality: i64,
    ) -> Result<ReviewOutcome, ReviewServiceError> {
        let quality = ReviewQuality::new(quality)?;

        let card = self.cards.get_card(card_id).await?;
        if !card.belongs_to(user) {
            return Err(ReviewServiceError::NotOwner {
                card: card_id,
                user,
            });
        }

        let reviewed_at = self.now();
        let applied = self.scheduler.apply_review(&card, quality, reviewed_at);
        let outcome = AnswerOutcome::new(user, card.question_id, applied.is_pass(), reviewed_at);

        self.reviews
            .apply_review(card.revision, &applied.card, &applied.log, &outcome)
            .await?;

        info!(
            user_id = %user,
            card_id = %card_id,
            quality = quality.value(),
            interval_days = applied.card.interval_days,
            status = applied.card.status.as_str(),
            "srs review applied"
        );

        Ok(ReviewOutcome {
            card: applied.card,
            log: applied.log,
        })
    }

    /// Give `question` a card for `user`, returning the existing one if present.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` if the card cannot be written.
    pub async fn enroll_card(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<SrsCard, ReviewServiceError> {
        Ok(self
            .cards
            .insert_card_if_absent(user, question, self.now())
            .await?)
    }

    /// Cards due now, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` on read failure.
    pub async fn due_cards(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<SrsCard>, ReviewServiceError> {
        Ok(self.cards.get_srs_cards_due(user, self.now(), limit).await?)
    }

    /// # Errors
    ///
    /// Returns `ReviewServiceError::Storage` on read failure.
    pub async fn count_due(&self, user: UserId) -> Result<u32, ReviewServiceError> {
        Ok(self.cards.count_due(user, self.now()).await?)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::{CardStatus, ReviewError};
    use prep_core::time::{fixed_clock, fixed_now};
    use storage::InMemoryRepository;
    use storage::repository::{PerformanceRepository, StorageError};

    fn service(repo: &InMemoryRepository) -> ReviewService {
        let repo = Arc::new(repo.clone());
        ReviewService::new(fixed_clock(), repo.clone(), repo)
    }

    #[tokio::test]
    async fn first_pass_moves_card_into_review() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(1);

        let mut ids = Vec::new();
        for q in 1..=3 {
            ids.push(svc.enroll_card(user, QuestionId::new(q)).await.unwrap().id);
        }
        assert_eq!(svc.count_due(user).await.unwrap(), 3);

        for id in ids {
            let reviewed = svc.submit_srs_review(user, id, 5).await.unwrap();
            assert!(reviewed.is_pass());
            assert_eq!(reviewed.card.interval_days, 1);
            assert_eq!(reviewed.card.repetitions, 1);
            assert!((reviewed.card.ease_factor - 2.6).abs() < 1e-9);
            assert_eq!(reviewed.card.status, CardStatus::Review);
        }
        assert_eq!(svc.count_due(user).await.unwrap(), 0);

        let perf = repo
            .get_performance(user, QuestionId::new(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(perf.times_correct, 1);
    }

    #[tokio::test]
    async fn failed_recall_counts_as_incorrect() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(1);
        let card = svc.enroll_card(user, QuestionId::new(7)).await.unwrap();

        let reviewed = svc.submit_srs_review(user, card.id, 1).await.unwrap();
        assert_eq!(reviewed.card.status, CardStatus::Learning);
        assert_eq!(reviewed.log.previous_interval_days, 0);

        let perf = repo
            .get_performance(user, QuestionId::new(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(perf.times_incorrect, 1);
    }

    #[tokio::test]
    async fn out_of_range_quality_is_rejected_before_any_write() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(1);
        let card = svc.enroll_card(user, QuestionId::new(1)).await.unwrap();

        for bad in [-1, 6] {
            let err = svc.submit_srs_review(user, card.id, bad).await.unwrap_err();
            assert!(matches!(
                err,
                ReviewServiceError::Quality(ReviewError::InvalidQuality(q)) if q == bad
            ));
        }
        assert_eq!(repo.get_card(card.id).await.unwrap().revision, 0);
    }

    #[tokio::test]
    async fn reviewing_another_users_card_is_rejected() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let card = svc
            .enroll_card(UserId::new(1), QuestionId::new(1))
            .await
            .unwrap();

        let err = svc
            .submit_srs_review(UserId::new(2), card.id, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewServiceError::NotOwner { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn missing_card_surfaces_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .submit_srs_review(UserId::new(1), CardId::new(42), 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewServiceError::Storage(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn due_cards_follow_the_clock() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(1);
        let card = svc.enroll_card(user, QuestionId::new(1)).await.unwrap();
        svc.submit_srs_review(user, card.id, 4).await.unwrap();

        assert!(svc.due_cards(user, 10).await.unwrap().is_empty());
        let tomorrow = svc.with_clock(Clock::fixed(fixed_now() + Duration::days(1)));
        let due = tomorrow.due_cards(user, 10).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, card.id);
    }
}
