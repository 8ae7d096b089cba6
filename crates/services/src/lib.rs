#![forbid(unsafe_code)]

pub mod blueprint;
pub mod config;
pub mod engine;
pub mod error;
pub mod performance_service;
pub mod readiness_service;
pub mod review_service;
pub mod sessions;
pub mod simulation;

pub use prep_core::Clock;

pub use config::{ConfigError, EngineConfig};
pub use engine::StudyEngine;
pub use error::{
    EngineError, PerformanceError, PlanError, ReadinessError, ReviewServiceError, SimulationError,
};
pub use performance_service::{
    AnswerVerdict, AttemptBatch, AttemptSummary, PerformanceService, SubmittedAnswer,
};
pub use readiness_service::ReadinessService;
pub use review_service::{ReviewOutcome, ReviewService};
pub use sessions::{SessionPlanService, SessionPlanner};
pub use simulation::{SimulationService, SimulationSubmission};
