use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, UserId};

/// One evaluated answer, the unit the performance aggregator consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub response_time_ms: Option<u32>,
    pub answered_at: DateTime<Utc>,
}

impl AnswerOutcome {
    #[must_use]
    pub fn new(
        user_id: UserId,
        question_id: QuestionId,
        is_correct: bool,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            question_id,
            is_correct,
            response_time_ms: None,
            answered_at,
        }
    }

    #[must_use]
    pub fn with_response_time(mut self, ms: Option<u32>) -> Self {
        self.response_time_ms = ms;
        self
    }
}

/// Rolling per-user, per-question statistics.
///
/// Exactly one record exists per `(user_id, question_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub times_seen: u32,
    pub times_correct: u32,
    pub times_incorrect: u32,
    pub last_seen_at: DateTime<Utc>,
    pub last_correct_at: Option<DateTime<Utc>>,
    pub avg_response_ms: Option<f64>,
}

impl PerformanceRecord {
    /// Create the record for the first answer seen for this key.
    #[must_use]
    pub fn first(outcome: &AnswerOutcome) -> Self {
        let mut record = Self {
            user_id: outcome.user_id,
            question_id: outcome.question_id,
            times_seen: 0,
            times_correct: 0,
            times_incorrect: 0,
            last_seen_at: outcome.answered_at,
            last_correct_at: None,
            avg_response_ms: None,
        };
        record.record(outcome);
        record
    }

    /// Fold one more answer into the record.
    ///
    /// The average response time is a streaming mean over `times_seen`; when no
    /// prior average exists the sample becomes the average.
    pub fn record(&mut self, outcome: &AnswerOutcome) {
        self.times_seen = self.times_seen.saturating_add(1);
        self.last_seen_at = outcome.answered_at;

        if outcome.is_correct {
            self.times_correct = self.times_correct.saturating_add(1);
            self.last_correct_at = Some(outcome.answered_at);
        } else {
            self.times_incorrect = self.times_incorrect.saturating_add(1);
        }

        if let Some(sample) = outcome.response_time_ms {
            let sample = f64::from(sample);
            let n = f64::from(self.times_seen);
            self.avg_response_ms = Some(match self.avg_response_ms {
                Some(old) => (old * (n - 1.0) + sample) / n,
                None => sample,
            });
        }
    }
}

/// Seen/correct counters aggregated over a set of questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceTotals {
    pub seen: u32,
    pub correct: u32,
}

impl PerformanceTotals {
    #[must_use]
    pub fn new(seen: u32, correct: u32) -> Self {
        Self { seen, correct }
    }

    pub fn add(&mut self, other: PerformanceTotals) {
        self.seen = self.seen.saturating_add(other.seen);
        self.correct = self.correct.saturating_add(other.correct);
    }

    /// Percent correct in `[0, 100]`, `0.0` when nothing was seen.
    #[must_use]
    pub fn percent_correct(&self) -> f64 {
        if self.seen == 0 {
            0.0
        } else {
            100.0 * f64::from(self.correct) / f64::from(self.seen)
        }
    }
}
