use std::collections::BTreeMap;

use prep_core::model::{
    Certification, CertificationId, Domain, DomainId, Enrollment, Question, QuestionId, UserId,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{
    certification_id_from_i64, conn, decode_question_kind, domain_id_from_i64,
    encode_question_kind, id_i64, map_certification_row, map_domain_row, question_id_from_i64,
    ser, u32_from_i64, user_id_from_i64,
};
use crate::repository::{CatalogRepository, EnrollmentRepository, StorageError};

impl SqliteRepository {
    /// Attach domain tags to question rows fetched in id order.
    fn assemble_questions(
        rows: &[SqliteRow],
        tags: &[SqliteRow],
    ) -> Result<Vec<Question>, StorageError> {
        let mut by_question: BTreeMap<QuestionId, Vec<DomainId>> = BTreeMap::new();
        for tag in tags {
            let question = question_id_from_i64(tag.try_get("question_id").map_err(ser)?)?;
            let domain = domain_id_from_i64(tag.try_get("domain_id").map_err(ser)?)?;
            by_question.entry(question).or_default().push(domain);
        }

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = question_id_from_i64(row.try_get("id").map_err(ser)?)?;
            let kind: String = row.try_get("kind").map_err(ser)?;
            let payload: String = row.try_get("payload").map_err(ser)?;
            let question = Question::new(
                id,
                row.try_get::<String, _>("text").map_err(ser)?,
                decode_question_kind(id, &kind, &payload),
            )
            .with_domains(by_question.remove(&id).unwrap_or_default());
            out.push(question);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_certification(&self, cert: &Certification) -> Result<(), StorageError> {
        let passing = serde_json::to_string(&cert.passing_score).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO certifications (id, code, name, passing_score)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                name = excluded.name,
                passing_score = excluded.passing_score
            ",
        )
        .bind(id_i64("certification_id", cert.id.value())?)
        .bind(&cert.code)
        .bind(&cert.name)
        .bind(passing)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_certification(&self, id: CertificationId) -> Result<Certification, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, code, name, passing_score
                FROM certifications
                WHERE id = ?1
            ",
        )
        .bind(id_i64("certification_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_certification_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn upsert_domain(&self, domain: &Domain) -> Result<(), StorageError> {
        let parent = domain
            .parent_id
            .map(|p| id_i64("parent_id", p.value()))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO domains (id, certification_id, code, name, weight, parent_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                certification_id = excluded.certification_id,
                code = excluded.code,
                name = excluded.name,
                weight = excluded.weight,
                parent_id = excluded.parent_id
            ",
        )
        .bind(id_i64("domain_id", domain.id.value())?)
        .bind(id_i64("certification_id", domain.certification_id.value())?)
        .bind(&domain.code)
        .bind(&domain.name)
        .bind(domain.weight)
        .bind(parent)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_domains(&self, cert: CertificationId) -> Result<Vec<Domain>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, certification_id, code, name, weight, parent_id
                FROM domains
                WHERE certification_id = ?1
                ORDER BY code ASC, id ASC
            ",
        )
        .bind(id_i64("certification_id", cert.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_domain_row).collect()
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let id = id_i64("question_id", question.id.value())?;
        let payload = encode_question_kind(&question.kind)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO questions (id, text, kind, payload)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                kind = excluded.kind,
                payload = excluded.payload
            ",
        )
        .bind(id)
        .bind(&question.text)
        .bind(question.kind.as_str())
        .bind(payload)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM question_domains WHERE question_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for domain in &question.domain_ids {
            sqlx::query(
                r"
                INSERT INTO question_domains (question_id, domain_id)
                VALUES (?1, ?2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(id)
            .bind(id_i64("domain_id", domain.value())?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        let qid = id_i64("question_id", id.value())?;

        let rows = sqlx::query("SELECT id, text, kind, payload FROM questions WHERE id = ?1")
            .bind(qid)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        if rows.is_empty() {
            return Err(StorageError::NotFound);
        }

        let tags = sqlx::query(
            r"
                SELECT question_id, domain_id
                FROM question_domains
                WHERE question_id = ?1
                ORDER BY domain_id
            ",
        )
        .bind(qid)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        Self::assemble_questions(&rows, &tags)?
            .into_iter()
            .next()
            .ok_or(StorageError::NotFound)
    }

    async fn get_question_bank(&self, domain: DomainId) -> Result<Vec<Question>, StorageError> {
        let did = id_i64("domain_id", domain.value())?;

        let rows = sqlx::query(
            r"
                SELECT q.id, q.text, q.kind, q.payload
                FROM questions q
                JOIN question_domains qd ON qd.question_id = q.id
                WHERE qd.domain_id = ?1
                ORDER BY q.id ASC
            ",
        )
        .bind(did)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let tags = sqlx::query(
            r"
                SELECT question_id, domain_id
                FROM question_domains
                WHERE question_id IN (
                    SELECT question_id FROM question_domains WHERE domain_id = ?1
                )
                ORDER BY question_id, domain_id
            ",
        )
        .bind(did)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        Self::assemble_questions(&rows, &tags)
    }

    async fn count_questions(&self, domains: &[DomainId]) -> Result<u32, StorageError> {
        if domains.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(DISTINCT question_id) FROM question_domains WHERE domain_id IN (",
        );
        let mut ids = qb.separated(", ");
        for domain in domains {
            ids.push_bind(id_i64("domain_id", domain.value())?);
        }
        ids.push_unseparated(")");

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u32_from_i64("question_count", count)
    }
}

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO enrollments (user_id, certification_id, enrolled_at, target_date)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, certification_id) DO UPDATE SET
                enrolled_at = excluded.enrolled_at,
                target_date = excluded.target_date
            ",
        )
        .bind(id_i64("user_id", enrollment.user_id.value())?)
        .bind(id_i64("certification_id", enrollment.certification_id.value())?)
        .bind(enrollment.enrolled_at)
        .bind(enrollment.target_date)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn latest_enrollment(&self, user: UserId) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, certification_id, enrolled_at, target_date
                FROM enrollments
                WHERE user_id = ?1
                ORDER BY enrolled_at DESC, certification_id DESC
                LIMIT 1
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Enrollment {
            user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
            certification_id: certification_id_from_i64(
                row.try_get("certification_id").map_err(ser)?,
            )?,
            enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
            target_date: row.try_get("target_date").map_err(ser)?,
        }))
    }
}
