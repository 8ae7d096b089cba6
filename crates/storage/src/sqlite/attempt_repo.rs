use chrono::{DateTime, Utc};
use prep_core::model::{AnswerOutcome, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64};
use super::performance_repo::upsert_performance_row;
use crate::repository::{AttemptRecord, AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn record_attempt(
        &self,
        attempt: &AttemptRecord,
        outcomes: &[AnswerOutcome],
    ) -> Result<i64, StorageError> {
        let cert = attempt
            .certification_id
            .map(|c| id_i64("certification_id", c.value()))
            .transpose()?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO attempts (
                    user_id, certification_id, answered, correct, time_spent_secs, recorded_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_i64("user_id", attempt.user_id.value())?)
        .bind(cert)
        .bind(i64::from(attempt.answered))
        .bind(i64::from(attempt.correct))
        .bind(i64::from(attempt.time_spent_secs))
        .bind(attempt.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for outcome in outcomes {
            upsert_performance_row(&mut *tx, outcome).await?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(res.last_insert_rowid())
    }

    async fn study_seconds_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let total: i64 = sqlx::query_scalar(
            r"
                SELECT
                    (SELECT COALESCE(SUM(time_spent_secs), 0)
                     FROM attempts
                     WHERE user_id = ?1 AND recorded_at >= ?2)
                  + (SELECT COALESCE(SUM(duration_secs), 0)
                     FROM simulations
                     WHERE user_id = ?1 AND completed_at >= ?2)
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        u64::try_from(total)
            .map_err(|_| StorageError::Serialization(format!("invalid study seconds: {total}")))
    }
}
