use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use prep_core::evaluator;
use prep_core::model::{
    Answer, AnswerOutcome, CardId, CertificationId, PerformanceRecord, QuestionId, UserId,
};
use storage::repository::{
    AttemptRecord, AttemptRepository, CatalogRepository, PerformanceRepository,
    SrsCardRepository, StorageError,
};

use crate::Clock;
use crate::error::PerformanceError;

//
// ─── BATCHES ───────────────────────────────────────────────────────────────────
//

/// One question of a practice batch; `answer` is `None` when it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: QuestionId,
    pub answer: Option<Answer>,
    #[serde(default)]
    pub response_time_ms: Option<u32>,
}

impl SubmittedAnswer {
    #[must_use]
    pub fn new(question_id: QuestionId, answer: Option<Answer>) -> Self {
        Self {
            question_id,
            answer,
            response_time_ms: None,
        }
    }

    #[must_use]
    pub fn with_response_time(mut self, ms: u32) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}

/// A submitted practice attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptBatch {
    pub user_id: UserId,
    #[serde(default)]
    pub certification_id: Option<CertificationId>,
    pub answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub time_spent_secs: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerVerdict {
    pub question_id: QuestionId,
    pub is_correct: bool,
}

/// What `record_attempt` graded and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub answered: u32,
    pub correct: u32,
    pub verdicts: Vec<AnswerVerdict>,
    /// Cards held by the missed questions, when missed-question enrollment is on.
    pub enrolled_cards: Vec<CardId>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Grades practice answers and folds them into per-question statistics.
#[derive(Clone)]
pub struct PerformanceService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    performance: Arc<dyn PerformanceRepository>,
    attempts: Arc<dyn AttemptRepository>,
    cards: Arc<dyn SrsCardRepository>,
    enroll_missed: bool,
}

impl PerformanceService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        performance: Arc<dyn PerformanceRepository>,
        attempts: Arc<dyn AttemptRepository>,
        cards: Arc<dyn SrsCardRepository>,
        enroll_missed: bool,
    ) -> Self {
        Self {
            clock,
            catalog,
            performance,
            attempts,
            cards,
            enroll_missed,
        }
    }

    /// Grade an answer against a stored question.
    ///
    /// # Errors
    ///
    /// Returns `PerformanceError::Storage` if the question cannot be loaded.
    pub async fn evaluate(
        &self,
        question_id: QuestionId,
        answer: Option<&Answer>,
    ) -> Result<bool, PerformanceError> {
        let question = self.catalog.get_question(question_id).await?;
        Ok(evaluator::is_correct(answer, &question.kind))
    }

    /// Fold a single answer into the learner's record for that question.
    ///
    /// # Errors
    ///
    /// Returns `PerformanceError::Storage` if the record cannot be written.
    pub async fn upsert_performance(
        &self,
        user: UserId,
        question: QuestionId,
        is_correct: bool,
        response_time_ms: Option<u32>,
    ) -> Result<PerformanceRecord, PerformanceError> {
        let outcome = AnswerOutcome::new(user, question, is_correct, self.clock.now())
            .with_response_time(response_time_ms);
        Ok(self.performance.upsert_performance(&outcome).await?)
    }

    /// Grade and store a practice batch.
    ///
    /// Skipped questions and questions missing from the bank leave no trace.
    /// The attempt row and every performance update are written together.
    /// Missed questions are enrolled afterwards on a best-effort basis: a
    /// failed enrollment is logged and left out of `enrolled_cards`.
    ///
    /// # Errors
    ///
    /// Returns `PerformanceError::Storage` if a question lookup or the write
    /// fails; nothing is stored in that case.
    pub async fn record_attempt(
        &self,
        batch: &AttemptBatch,
    ) -> Result<AttemptSummary, PerformanceError> {
        let now = self.clock.now();
        let user = batch.user_id;

        let mut outcomes = Vec::with_capacity(batch.answers.len());
        let mut verdicts = Vec::with_capacity(batch.answers.len());
        for submitted in &batch.answers {
            let Some(answer) = submitted.answer.as_ref() else {
                debug!(question_id = %submitted.question_id, "skipping unanswered question");
                continue;
            };

            let question = match self.catalog.get_question(submitted.question_id).await {
                Ok(q) => q,
                Err(StorageError::NotFound) => {
                    warn!(
                        user_id = %user,
                        question_id = %submitted.question_id,
                        "answer for unknown question ignored"
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let is_correct = evaluator::is_correct(Some(answer), &question.kind);
            verdicts.push(AnswerVerdict {
                question_id: question.id,
                is_correct,
            });
            outcomes.push(
                AnswerOutcome::new(user, question.id, is_correct, now)
                    .with_response_time(submitted.response_time_ms),
            );
        }

        let answered = u32::try_from(verdicts.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(verdicts.iter().filter(|v| v.is_correct).count())
            .unwrap_or(u32::MAX);

        let record = AttemptRecord {
            user_id: user,
            certification_id: batch.certification_id,
            answered,
            correct,
            time_spent_secs: batch.time_spent_secs.unwrap_or(0),
            recorded_at: now,
        };
        let attempt_id = self.attempts.record_attempt(&record, &outcomes).await?;

        // The attempt is committed; enrollment failures must not invite a retry.
        let mut enrolled_cards = Vec::new();
        if self.enroll_missed {
            for verdict in verdicts.iter().filter(|v| !v.is_correct) {
                match self
                    .cards
                    .insert_card_if_absent(user, verdict.question_id, now)
                    .await
                {
                    Ok(card) => {
                        if !enrolled_cards.contains(&card.id) {
                            enrolled_cards.push(card.id);
                        }
                    }
                    Err(e) => warn!(
                        user_id = %user,
                        question_id = %verdict.question_id,
                        error = %e,
                        "could not enroll missed question"
                    ),
                }
            }
        }

        info!(
            user_id = %user,
            attempt_id,
            answered,
            correct,
            enrolled = enrolled_cards.len(),
            "attempt recorded"
        );

        Ok(AttemptSummary {
            attempt_id,
            answered,
            correct,
            verdicts,
            enrolled_cards,
        })
    }
}
