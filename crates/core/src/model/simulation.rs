use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::domain::Domain;
use crate::model::ids::{CertificationId, DomainId, SimulationId, UserId};
use crate::model::question::Question;

/// A question drawn into a simulation, remembering which domain it was drawn for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledQuestion {
    pub question: Question,
    pub domain_id: DomainId,
    pub domain_name: String,
    pub domain_code: String,
}

impl SampledQuestion {
    #[must_use]
    pub fn new(question: Question, domain: &Domain) -> Self {
        Self {
            question,
            domain_id: domain.id,
            domain_name: domain.name.clone(),
            domain_code: domain.code.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainScore {
    pub correct: u32,
    pub total: u32,
}

impl DomainScore {
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * f64::from(self.correct) / f64::from(self.total)
        }
    }
}

/// Outcome of a completed mock exam. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub user_id: UserId,
    pub certification_id: CertificationId,
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub passed: bool,
    pub domain_scores: BTreeMap<DomainId, DomainScore>,
    pub duration_secs: Option<u32>,
    pub completed_at: DateTime<Utc>,
}

/// A recorded simulation together with its storage id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRow {
    pub id: SimulationId,
    pub result: SimulationResult,
}

impl SimulationRow {
    #[must_use]
    pub fn new(id: SimulationId, result: SimulationResult) -> Self {
        Self { id, result }
    }
}

/// Accumulates graded simulation answers into a `SimulationResult`.
#[derive(Debug, Clone, Default)]
pub struct SimulationTally {
    domain_scores: BTreeMap<DomainId, DomainScore>,
    score: u32,
    total: u32,
}

impl SimulationTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, domain_id: DomainId, is_correct: bool) {
        let entry = self.domain_scores.entry(domain_id).or_default();
        entry.total += 1;
        self.total += 1;
        if is_correct {
            entry.correct += 1;
            self.score += 1;
        }
    }

    /// Close the tally. `passed` compares the percentage against `passing_pct`.
    #[must_use]
    pub fn finish(
        self,
        user_id: UserId,
        certification_id: CertificationId,
        passing_pct: f64,
        duration_secs: Option<u32>,
        completed_at: DateTime<Utc>,
    ) -> SimulationResult {
        let percentage = if self.total == 0 {
            0.0
        } else {
            100.0 * f64::from(self.score) / f64::from(self.total)
        };
        SimulationResult {
            user_id,
            certification_id,
            score: self.score,
            total: self.total,
            percentage,
            passed: self.total > 0 && percentage >= passing_pct,
            domain_scores: self.domain_scores,
            duration_secs,
            completed_at,
        }
    }
}
