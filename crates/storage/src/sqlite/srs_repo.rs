use chrono::{DateTime, Utc};
use prep_core::model::{AnswerOutcome, CardId, QuestionId, ReviewLog, SrsCard, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_card_row, u32_from_i64};
use super::performance_repo::upsert_performance_row;
use crate::repository::{ReviewPersistence, SrsCardRepository, StorageError};

const CARD_COLUMNS: &str = "id, user_id, question_id, ease_factor, interval_days, repetitions, \
     next_review_at, last_reviewed_at, status, revision";

#[async_trait::async_trait]
impl SrsCardRepository for SqliteRepository {
    async fn get_card(&self, id: CardId) -> Result<SrsCard, StorageError> {
        let row = sqlx::query(&format!("SELECT {CARD_COLUMNS} FROM srs_cards WHERE id = ?1"))
            .bind(id_i64("card_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_card_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn find_card(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<SrsCard>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {CARD_COLUMNS} FROM srs_cards WHERE user_id = ?1 AND question_id = ?2"
        ))
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("question_id", question.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_card_row).transpose()
    }

    async fn insert_card_if_absent(
        &self,
        user: UserId,
        question: QuestionId,
        now: DateTime<Utc>,
    ) -> Result<SrsCard, StorageError> {
        let fresh = SrsCard::new(CardId::new(0), user, question, now);

        sqlx::query(
            r"
            INSERT INTO srs_cards (
                user_id, question_id, ease_factor, interval_days, repetitions,
                next_review_at, last_reviewed_at, status, revision
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, 0)
            ON CONFLICT(user_id, question_id) DO NOTHING
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("question_id", question.value())?)
        .bind(fresh.ease_factor)
        .bind(i64::from(fresh.interval_days))
        .bind(i64::from(fresh.repetitions))
        .bind(fresh.next_review_at)
        .bind(fresh.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.find_card(user, question)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn get_srs_cards_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SrsCard>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
                SELECT {CARD_COLUMNS}
                FROM srs_cards
                WHERE user_id = ?1 AND status != 'graduated' AND next_review_at <= ?2
                ORDER BY next_review_at ASC, id ASC
                LIMIT ?3
            "
        ))
        .bind(id_i64("user_id", user.value())?)
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_card_row).collect()
    }

    async fn count_due(&self, user: UserId, now: DateTime<Utc>) -> Result<u32, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r"
                SELECT COUNT(*)
                FROM srs_cards
                WHERE user_id = ?1 AND status != 'graduated' AND next_review_at <= ?2
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        u32_from_i64("due_count", count)
    }
}

#[async_trait::async_trait]
impl ReviewPersistence for SqliteRepository {
    async fn apply_review(
        &self,
        expected_revision: u32,
        card: &SrsCard,
        log: &ReviewLog,
        outcome: &AnswerOutcome,
    ) -> Result<(), StorageError> {
        if log.card_id != card.id
            || outcome.user_id != card.user_id
            || outcome.question_id != card.question_id
        {
            return Err(StorageError::Conflict);
        }

        let card_id = id_i64("card_id", card.id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            UPDATE srs_cards SET
                ease_factor = ?1,
                interval_days = ?2,
                repetitions = ?3,
                next_review_at = ?4,
                last_reviewed_at = ?5,
                status = ?6,
                revision = ?7
            WHERE id = ?8 AND revision = ?9
            ",
        )
        .bind(card.ease_factor)
        .bind(i64::from(card.interval_days))
        .bind(i64::from(card.repetitions))
        .bind(card.next_review_at)
        .bind(card.last_reviewed_at)
        .bind(card.status.as_str())
        .bind(i64::from(card.revision))
        .bind(card_id)
        .bind(i64::from(expected_revision))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM srs_cards WHERE id = ?1")
                .bind(card_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(conn)?;
            return Err(if exists.is_some() {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        sqlx::query(
            r"
                INSERT INTO srs_review_logs (
                    card_id, quality, reviewed_at, previous_interval_days,
                    interval_days, ease_factor
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(card_id)
        .bind(i64::from(log.quality))
        .bind(log.reviewed_at)
        .bind(i64::from(log.previous_interval_days))
        .bind(i64::from(log.interval_days))
        .bind(log.ease_factor)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        upsert_performance_row(&mut *tx, outcome).await?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
