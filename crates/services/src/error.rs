//! Shared error types for the services crate.

use thiserror::Error;

use prep_core::model::{CardId, ReviewError, UserId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `PerformanceService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PerformanceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error(transparent)]
    Quality(#[from] ReviewError),
    #[error("card {card} does not belong to user {user}")]
    NotOwner { card: CardId, user: UserId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SimulationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimulationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ReadinessService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadinessError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SessionPlanService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanError {
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping the engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PerformanceError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            PerformanceError::Storage(e) => e.is_retryable(),
        }
    }
}

impl ReviewServiceError {
    /// Invalid quality and ownership mismatches are rejected outright; only
    /// transient storage failures are worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ReviewServiceError::Storage(e) => e.is_retryable(),
            ReviewServiceError::Quality(_) | ReviewServiceError::NotOwner { .. } => false,
        }
    }
}

impl SimulationError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SimulationError::Storage(e) => e.is_retryable(),
        }
    }
}

impl ReadinessError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ReadinessError::Storage(e) => e.is_retryable(),
        }
    }
}

impl PlanError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            PlanError::Readiness(e) => e.is_retryable(),
            PlanError::Storage(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_terminal_and_store_failures_retryable() {
        let quality = ReviewServiceError::from(ReviewError::InvalidQuality(9));
        assert!(!quality.is_retryable());

        let owner = ReviewServiceError::NotOwner {
            card: CardId::new(1),
            user: UserId::new(2),
        };
        assert!(!owner.is_retryable());
        assert_eq!(owner.to_string(), "card 1 does not belong to user 2");

        assert!(ReviewServiceError::from(StorageError::Conflict).is_retryable());
        assert!(PlanError::from(ReadinessError::from(StorageError::Connection("x".into()))).is_retryable());
        assert!(!SimulationError::from(StorageError::NotFound).is_retryable());
    }
}
