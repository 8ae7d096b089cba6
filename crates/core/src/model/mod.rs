mod card;
mod domain;
mod ids;
mod performance;
mod question;
mod review;
mod session;
mod simulation;

pub use ids::{CardId, CertificationId, DomainId, ParseIdError, QuestionId, SimulationId, UserId};

pub use card::{
    CardError, CardStatus, GRADUATION_INTERVAL_DAYS, INITIAL_EASE_FACTOR, MIN_EASE_FACTOR, SrsCard,
};
pub use domain::{Certification, Domain, DomainError, Enrollment, PassingScore};
pub use performance::{AnswerOutcome, PerformanceRecord, PerformanceTotals};
pub use question::{Answer, ChoiceAnswer, MatchPair, OrderedItem, Question, QuestionKind};
pub use review::{ReviewError, ReviewLog, ReviewQuality};
pub use session::{
    CertificationSummary, DOMAIN_QUIZ_BASE_PRIORITY, SIMULATION_PROMPT_PRIORITY, SRS_REVIEW_PRIORITY,
    SessionBlock, SessionBlockKind, SessionContext, SessionPlan, domain_quiz_minutes,
    srs_review_minutes,
};
pub use simulation::{DomainScore, SampledQuestion, SimulationResult, SimulationRow, SimulationTally};
