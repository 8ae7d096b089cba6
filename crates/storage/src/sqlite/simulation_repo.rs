use prep_core::model::{
    AnswerOutcome, CertificationId, SimulationId, SimulationResult, SimulationRow, UserId,
};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_simulation_row, ser, simulation_id_from_i64};
use super::performance_repo::upsert_performance_row;
use crate::repository::{SimulationRepository, StorageError};

#[async_trait::async_trait]
impl SimulationRepository for SqliteRepository {
    async fn get_simulation_history(
        &self,
        user: UserId,
        cert: CertificationId,
        limit: u32,
    ) -> Result<Vec<SimulationRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, certification_id, score, total, percentage, passed,
                    domain_scores, duration_secs, completed_at
                FROM simulations
                WHERE user_id = ?1 AND certification_id = ?2
                ORDER BY completed_at DESC, id DESC
                LIMIT ?3
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("certification_id", cert.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_simulation_row).collect()
    }

    async fn record_simulation(
        &self,
        result: &SimulationResult,
        outcomes: &[AnswerOutcome],
    ) -> Result<SimulationId, StorageError> {
        let domain_scores = serde_json::to_string(&result.domain_scores).map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
                INSERT INTO simulations (
                    user_id, certification_id, score, total, percentage, passed,
                    domain_scores, duration_secs, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(id_i64("user_id", result.user_id.value())?)
        .bind(id_i64("certification_id", result.certification_id.value())?)
        .bind(i64::from(result.score))
        .bind(i64::from(result.total))
        .bind(result.percentage)
        .bind(result.passed)
        .bind(domain_scores)
        .bind(result.duration_secs.map(i64::from))
        .bind(result.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        for outcome in outcomes {
            upsert_performance_row(&mut *tx, outcome).await?;
        }

        tx.commit().await.map_err(conn)?;
        simulation_id_from_i64(res.last_insert_rowid())
    }
}
