use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::domain::Certification;
use crate::model::ids::{CertificationId, DomainId};
use crate::readiness::{DomainReadiness, DomainStatus};

pub const SRS_REVIEW_PRIORITY: u32 = 1;
pub const DOMAIN_QUIZ_BASE_PRIORITY: u32 = 10;
pub const SIMULATION_PROMPT_PRIORITY: u32 = 50;

//
// ─── ESTIMATES ─────────────────────────────────────────────────────────────────
//

/// Minutes for an SRS block: half a minute per due card, at least two.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn srs_review_minutes(due_count: u32) -> u32 {
    ((f64::from(due_count) * 0.5).round() as u32).max(2)
}

/// Minutes for a domain quiz: 1.2 minutes per question, at least five.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn domain_quiz_minutes(question_count: u32) -> u32 {
    ((f64::from(question_count) * 1.2).round() as u32).max(5)
}

//
// ─── BLOCKS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionBlockKind {
    SrsReview {
        due_count: u32,
    },
    DomainQuiz {
        certification_id: CertificationId,
        domain_id: DomainId,
        domain_code: String,
        domain_name: String,
        domain_status: DomainStatus,
        domain_score: f64,
        question_count: u32,
    },
    SimulationPrompt {
        certification_id: CertificationId,
        first_attempt: bool,
    },
}

/// One recommended study action. Lower `priority` comes first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBlock {
    pub priority: u32,
    pub title: String,
    pub subtitle: String,
    pub estimate_minutes: u32,
    #[serde(flatten)]
    pub kind: SessionBlockKind,
}

impl SessionBlock {
    #[must_use]
    pub fn srs_review(due_count: u32) -> Self {
        let noun = if due_count == 1 { "card" } else { "cards" };
        Self {
            priority: SRS_REVIEW_PRIORITY,
            title: "Spaced repetition review".to_owned(),
            subtitle: format!("{due_count} {noun} due"),
            estimate_minutes: srs_review_minutes(due_count),
            kind: SessionBlockKind::SrsReview { due_count },
        }
    }

    /// Quiz block for the `rank`-th weakest domain (0-based).
    #[must_use]
    pub fn domain_quiz(
        rank: u32,
        certification_id: CertificationId,
        domain: &DomainReadiness,
        question_count: u32,
    ) -> Self {
        let subtitle = match domain.status {
            DomainStatus::Unseen => "Not studied yet".to_owned(),
            _ => format!("{:.0}% correct so far", domain.score),
        };
        Self {
            priority: DOMAIN_QUIZ_BASE_PRIORITY.saturating_add(rank),
            title: format!("{} {}", domain.code, domain.name),
            subtitle,
            estimate_minutes: domain_quiz_minutes(question_count),
            kind: SessionBlockKind::DomainQuiz {
                certification_id,
                domain_id: domain.domain_id,
                domain_code: domain.code.clone(),
                domain_name: domain.name.clone(),
                domain_status: domain.status,
                domain_score: domain.score,
                question_count,
            },
        }
    }

    #[must_use]
    pub fn simulation_prompt(
        certification: &Certification,
        first_attempt: bool,
        estimate_minutes: u32,
    ) -> Self {
        let subtitle = if first_attempt {
            "Take a first full-length practice exam".to_owned()
        } else {
            "Check your progress with a full-length practice exam".to_owned()
        };
        Self {
            priority: SIMULATION_PROMPT_PRIORITY,
            title: format!("{} exam simulation", certification.code),
            subtitle,
            estimate_minutes,
            kind: SessionBlockKind::SimulationPrompt {
                certification_id: certification.id,
                first_attempt,
            },
        }
    }
}

//
// ─── PLAN ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificationSummary {
    pub id: CertificationId,
    pub code: String,
    pub name: String,
    pub passing_pct: f64,
}

/// Metadata shown next to the plan. It never affects block ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub certification: Option<CertificationSummary>,
    pub target_date: Option<NaiveDate>,
    pub days_to_target: Option<i64>,
    pub overall_readiness: Option<f64>,
    pub recent_study_hours: f64,
    pub has_history: bool,
    pub total_questions_answered: u32,
    pub overall_accuracy: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub blocks: Vec<SessionBlock>,
    pub context: SessionContext,
}

impl SessionPlan {
    /// Build a plan with blocks in ascending priority order.
    #[must_use]
    pub fn new(mut blocks: Vec<SessionBlock>, context: SessionContext) -> Self {
        blocks.sort_by_key(|b| b.priority);
        Self { blocks, context }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
