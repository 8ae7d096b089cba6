use prep_core::model::{
    AnswerOutcome, DomainId, PerformanceRecord, PerformanceTotals, QuestionId, UserId,
};
use sqlx::{QueryBuilder, Row, Sqlite};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_performance_row, ser, u32_from_i64};
use crate::repository::{PerformanceRepository, StorageError};

/// Fold one answer into its performance row in a single statement.
///
/// The streaming mean is computed against the row's current `times_seen`, so
/// concurrent writers to a key serialize on SQLite's write lock.
pub(crate) async fn upsert_performance_row<'e, E>(
    executor: E,
    outcome: &AnswerOutcome,
) -> Result<PerformanceRecord, StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let (correct, incorrect) = if outcome.is_correct { (1_i64, 0_i64) } else { (0, 1) };
    let last_correct = outcome.is_correct.then_some(outcome.answered_at);

    let row = sqlx::query(
        r"
        INSERT INTO performance (
            user_id, question_id, times_seen, times_correct, times_incorrect,
            last_seen_at, last_correct_at, avg_response_ms
        )
        VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(user_id, question_id) DO UPDATE SET
            times_seen = performance.times_seen + 1,
            times_correct = performance.times_correct + excluded.times_correct,
            times_incorrect = performance.times_incorrect + excluded.times_incorrect,
            last_seen_at = excluded.last_seen_at,
            last_correct_at = COALESCE(excluded.last_correct_at, performance.last_correct_at),
            avg_response_ms = CASE
                WHEN excluded.avg_response_ms IS NULL THEN performance.avg_response_ms
                WHEN performance.avg_response_ms IS NULL THEN excluded.avg_response_ms
                ELSE (performance.avg_response_ms * performance.times_seen
                      + excluded.avg_response_ms) / (performance.times_seen + 1)
            END
        RETURNING
            user_id, question_id, times_seen, times_correct, times_incorrect,
            last_seen_at, last_correct_at, avg_response_ms
        ",
    )
    .bind(id_i64("user_id", outcome.user_id.value())?)
    .bind(id_i64("question_id", outcome.question_id.value())?)
    .bind(correct)
    .bind(incorrect)
    .bind(outcome.answered_at)
    .bind(last_correct)
    .bind(outcome.response_time_ms.map(f64::from))
    .fetch_one(executor)
    .await
    .map_err(conn)?;

    map_performance_row(&row)
}

fn totals_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<PerformanceTotals, StorageError> {
    Ok(PerformanceTotals::new(
        u32_from_i64("seen", row.try_get("seen").map_err(ser)?)?,
        u32_from_i64("correct", row.try_get("correct").map_err(ser)?)?,
    ))
}

#[async_trait::async_trait]
impl PerformanceRepository for SqliteRepository {
    async fn get_performance(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<PerformanceRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    user_id, question_id, times_seen, times_correct, times_incorrect,
                    last_seen_at, last_correct_at, avg_response_ms
                FROM performance
                WHERE user_id = ?1 AND question_id = ?2
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("question_id", question.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_performance_row).transpose()
    }

    async fn upsert_performance(
        &self,
        outcome: &AnswerOutcome,
    ) -> Result<PerformanceRecord, StorageError> {
        upsert_performance_row(&self.pool, outcome).await
    }

    async fn totals_for_domains(
        &self,
        user: UserId,
        domains: &[DomainId],
    ) -> Result<PerformanceTotals, StorageError> {
        if domains.is_empty() {
            return Ok(PerformanceTotals::default());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            r"
                SELECT
                    COALESCE(SUM(times_seen), 0) AS seen,
                    COALESCE(SUM(times_correct), 0) AS correct
                FROM performance
                WHERE user_id = ",
        );
        qb.push_bind(id_i64("user_id", user.value())?);
        qb.push(
            " AND question_id IN (SELECT question_id FROM question_domains WHERE domain_id IN (",
        );
        let mut ids = qb.separated(", ");
        for domain in domains {
            ids.push_bind(id_i64("domain_id", domain.value())?);
        }
        ids.push_unseparated("))");

        let row = qb.build().fetch_one(&self.pool).await.map_err(conn)?;
        totals_from_row(&row)
    }

    async fn user_totals(&self, user: UserId) -> Result<PerformanceTotals, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    COALESCE(SUM(times_seen), 0) AS seen,
                    COALESCE(SUM(times_correct), 0) AS correct
                FROM performance
                WHERE user_id = ?1
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        totals_from_row(&row)
    }
}
