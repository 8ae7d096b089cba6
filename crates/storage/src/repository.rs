use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{
    AnswerOutcome, CardId, Certification, CertificationId, Domain, DomainId, Enrollment,
    PerformanceRecord, PerformanceTotals, Question, QuestionId, ReviewLog, SimulationId,
    SimulationResult, SimulationRow, SrsCard, UserId,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed.
    ///
    /// Lost compare-and-swap races and an unavailable store are transient;
    /// missing rows and undecodable data are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Conflict | StorageError::Connection(_))
    }
}

/// Append-only log entry for one submitted practice batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub user_id: UserId,
    pub certification_id: Option<CertificationId>,
    pub answered: u32,
    pub correct: u32,
    pub time_spent_secs: u32,
    pub recorded_at: DateTime<Utc>,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Certifications, their domain blueprint and the domain-tagged question bank.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the certification cannot be stored.
    async fn upsert_certification(&self, cert: &Certification) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_certification(&self, id: CertificationId) -> Result<Certification, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the domain cannot be stored.
    async fn upsert_domain(&self, domain: &Domain) -> Result<(), StorageError>;

    /// All domains of a certification, top-level and nested, ordered by code.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_domains(&self, cert: CertificationId) -> Result<Vec<Domain>, StorageError>;

    /// Persist a question and replace its domain tags.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError>;

    /// Questions tagged with `domain`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_question_bank(&self, domain: DomainId) -> Result<Vec<Question>, StorageError>;

    /// Distinct questions tagged with any of `domains`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn count_questions(&self, domains: &[DomainId]) -> Result<u32, StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the enrollment cannot be stored.
    async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// The user's most recently enrolled certification, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn latest_enrollment(&self, user: UserId) -> Result<Option<Enrollment>, StorageError>;
}

//
// ─── PERFORMANCE ───────────────────────────────────────────────────────────────
//

/// Per-(user, question) answer statistics.
///
/// Implementations serialize writers per key: two concurrent upserts for the
/// same key must both be reflected in `times_seen` and the streaming mean.
#[async_trait]
pub trait PerformanceRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_performance(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<PerformanceRecord>, StorageError>;

    /// Fold one answer into the record for its key, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn upsert_performance(
        &self,
        outcome: &AnswerOutcome,
    ) -> Result<PerformanceRecord, StorageError>;

    /// Seen/correct totals over the distinct questions tagged with any of `domains`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn totals_for_domains(
        &self,
        user: UserId,
        domains: &[DomainId],
    ) -> Result<PerformanceTotals, StorageError>;

    /// Seen/correct totals over every question the user has answered.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn user_totals(&self, user: UserId) -> Result<PerformanceTotals, StorageError>;
}

//
// ─── SRS CARDS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait SrsCardRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_card(&self, id: CardId) -> Result<SrsCard, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn find_card(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<SrsCard>, StorageError>;

    /// Create a new card for the key unless one exists; returns the stored card.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the card cannot be written.
    async fn insert_card_if_absent(
        &self,
        user: UserId,
        question: QuestionId,
        now: DateTime<Utc>,
    ) -> Result<SrsCard, StorageError>;

    /// Non-graduated cards with `next_review_at <= now`, oldest due first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_srs_cards_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SrsCard>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn count_due(&self, user: UserId, now: DateTime<Utc>) -> Result<u32, StorageError>;
}

/// Atomic persistence of an SRS review.
#[async_trait]
pub trait ReviewPersistence: Send + Sync {
    /// Store the reviewed card, its log entry and the matching performance
    /// update as one unit.
    ///
    /// The write only applies while the stored card is still at
    /// `expected_revision`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the card changed concurrently, or
    /// other storage errors; nothing is written in either case.
    async fn apply_review(
        &self,
        expected_revision: u32,
        card: &SrsCard,
        log: &ReviewLog,
        outcome: &AnswerOutcome,
    ) -> Result<(), StorageError>;
}

//
// ─── SIMULATIONS & ATTEMPTS ────────────────────────────────────────────────────
//

#[async_trait]
pub trait SimulationRepository: Send + Sync {
    /// Up to `limit` results for the user and certification, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn get_simulation_history(
        &self,
        user: UserId,
        cert: CertificationId,
        limit: u32,
    ) -> Result<Vec<SimulationRow>, StorageError>;

    /// Store a completed simulation and its per-question performance updates
    /// atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails; nothing is stored then.
    async fn record_simulation(
        &self,
        result: &SimulationResult,
        outcomes: &[AnswerOutcome],
    ) -> Result<SimulationId, StorageError>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt and apply its performance updates atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails; nothing is stored then.
    async fn record_attempt(
        &self,
        attempt: &AttemptRecord,
        outcomes: &[AnswerOutcome],
    ) -> Result<i64, StorageError>;

    /// Seconds of recorded study (attempts plus timed simulations) since `since`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn study_seconds_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<u64, StorageError>;
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub performance: Arc<dyn PerformanceRepository>,
    pub cards: Arc<dyn SrsCardRepository>,
    pub reviews: Arc<dyn ReviewPersistence>,
    pub simulations: Arc<dyn SimulationRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    /// Wire every repository to one backend instance.
    #[must_use]
    pub fn from_backend<R>(repo: R) -> Self
    where
        R: CatalogRepository
            + EnrollmentRepository
            + PerformanceRepository
            + SrsCardRepository
            + ReviewPersistence
            + SimulationRepository
            + AttemptRepository
            + Clone
            + 'static,
    {
        Self {
            catalog: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            performance: Arc::new(repo.clone()),
            cards: Arc::new(repo.clone()),
            reviews: Arc::new(repo.clone()),
            simulations: Arc::new(repo.clone()),
            attempts: Arc::new(repo),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_and_connection_are_retryable() {
        assert!(StorageError::Conflict.is_retryable());
        assert!(StorageError::Connection("down".into()).is_retryable());
        assert!(!StorageError::NotFound.is_retryable());
        assert!(!StorageError::Serialization("bad".into()).is_retryable());
    }
}
