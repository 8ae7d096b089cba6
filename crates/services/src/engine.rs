use std::sync::Arc;

use rand::Rng;

use prep_core::evaluator;
use prep_core::model::{
    Answer, CardId, CertificationId, DomainId, Question, QuestionId, SampledQuestion,
    SessionPlan, SimulationRow, SrsCard, UserId,
};
use prep_core::readiness::ReadinessReport;
use storage::repository::Storage;

use crate::Clock;
use crate::config::EngineConfig;
use crate::error::{
    EngineError, PerformanceError, PlanError, ReadinessError, ReviewServiceError, SimulationError,
};
use crate::performance_service::{AttemptBatch, AttemptSummary, PerformanceService};
use crate::readiness_service::ReadinessService;
use crate::review_service::{ReviewOutcome, ReviewService};
use crate::sessions::SessionPlanService;
use crate::simulation::{SimulationService, SimulationSubmission};

/// The study engine's operations, wired to one storage backend.
#[derive(Clone)]
pub struct StudyEngine {
    config: EngineConfig,
    performance: Arc<PerformanceService>,
    reviews: Arc<ReviewService>,
    simulations: Arc<SimulationService>,
    readiness: Arc<ReadinessService>,
    sessions: Arc<SessionPlanService>,
}

impl StudyEngine {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, config: EngineConfig) -> Self {
        let performance = Arc::new(PerformanceService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.performance),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.cards),
            config.enroll_missed_in_srs,
        ));
        let reviews = Arc::new(ReviewService::new(
            clock,
            Arc::clone(&storage.cards),
            Arc::clone(&storage.reviews),
        ));
        let simulations = Arc::new(SimulationService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.simulations),
            config.scaled_score_proxy_pct,
            config.default_simulation_size,
        ));
        let readiness = ReadinessService::new(
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.performance),
            Arc::clone(&storage.simulations),
            &config,
        );
        let sessions = Arc::new(SessionPlanService::new(
            clock,
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.cards),
            Arc::clone(&storage.performance),
            Arc::clone(&storage.simulations),
            Arc::clone(&storage.attempts),
            readiness.clone(),
            &config,
        ));

        Self {
            config,
            performance,
            reviews,
            simulations,
            readiness: Arc::new(readiness),
            sessions,
        }
    }

    /// Build an engine backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Sqlite` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, config))
    }

    //
    // ─── OPERATIONS ────────────────────────────────────────────────────────────
    //

    /// Grade `answer` against `question`'s key. Never fails.
    #[must_use]
    pub fn evaluate_answer(question: &Question, answer: Option<&Answer>) -> bool {
        evaluator::is_correct(answer, &question.kind)
    }

    /// # Errors
    ///
    /// See [`PerformanceService::record_attempt`].
    pub async fn record_attempt(
        &self,
        batch: &AttemptBatch,
    ) -> Result<AttemptSummary, PerformanceError> {
        self.performance.record_attempt(batch).await
    }

    /// # Errors
    ///
    /// See [`ReviewService::submit_srs_review`].
    pub async fn submit_srs_review(
        &self,
        user: UserId,
        card: CardId,
        quality: i64,
    ) -> Result<ReviewOutcome, ReviewServiceError> {
        self.reviews.submit_srs_review(user, card, quality).await
    }

    /// # Errors
    ///
    /// See [`ReviewService::enroll_card`].
    pub async fn enroll_card(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<SrsCard, ReviewServiceError> {
        self.reviews.enroll_card(user, question).await
    }

    /// Due cards, bounded by `limit` and the configured due-card cap.
    ///
    /// # Errors
    ///
    /// See [`ReviewService::due_cards`].
    pub async fn due_cards(
        &self,
        user: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<SrsCard>, ReviewServiceError> {
        let cap = self.config.srs_due_limit;
        let limit = limit.map_or(cap, |l| l.min(cap));
        self.reviews.due_cards(user, limit).await
    }

    /// # Errors
    ///
    /// See [`SimulationService::build_simulation`].
    pub async fn build_simulation<R: Rng + ?Sized>(
        &self,
        cert: CertificationId,
        requested_total: Option<u32>,
        rng: &mut R,
    ) -> Result<Vec<SampledQuestion>, SimulationError> {
        self.simulations
            .build_simulation(cert, requested_total, rng)
            .await
    }

    /// Questions for a planner domain block; `count` defaults to the
    /// configured quiz size.
    ///
    /// # Errors
    ///
    /// See [`SimulationService::build_domain_quiz`].
    pub async fn build_domain_quiz<R: Rng + ?Sized>(
        &self,
        cert: CertificationId,
        domain: DomainId,
        count: Option<u32>,
        rng: &mut R,
    ) -> Result<Vec<SampledQuestion>, SimulationError> {
        let count = count.unwrap_or(self.config.domain_quiz_max_questions);
        self.simulations
            .build_domain_quiz(cert, domain, count, rng)
            .await
    }

    /// # Errors
    ///
    /// See [`SimulationService::record_simulation`].
    pub async fn record_simulation(
        &self,
        submission: &SimulationSubmission,
    ) -> Result<SimulationRow, SimulationError> {
        self.simulations.record_simulation(submission).await
    }

    /// # Errors
    ///
    /// See [`ReadinessService::compute_readiness`].
    pub async fn compute_readiness(
        &self,
        user: UserId,
        cert: CertificationId,
    ) -> Result<ReadinessReport, ReadinessError> {
        self.readiness.compute_readiness(user, cert).await
    }

    /// # Errors
    ///
    /// See [`SessionPlanService::build_session_plan`].
    pub async fn build_session_plan(&self, user: UserId) -> Result<SessionPlan, PlanError> {
        self.sessions.build_session_plan(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::time::fixed_clock;

    #[tokio::test]
    async fn sqlite_engine_starts_empty() {
        let engine = StudyEngine::new_sqlite(
            "sqlite:file:engine_starts_empty?mode=memory&cache=shared",
            fixed_clock(),
            EngineConfig::default(),
        )
        .await
        .unwrap();
        let due = engine.due_cards(UserId::new(1), None).await.unwrap();
        assert!(due.is_empty());
    }
}
