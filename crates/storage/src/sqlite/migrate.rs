use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS certifications (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            passing_score TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS domains (
            id INTEGER PRIMARY KEY,
            certification_id INTEGER NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            weight REAL CHECK (weight IS NULL OR (weight >= 0 AND weight <= 1)),
            parent_id INTEGER,
            FOREIGN KEY (certification_id) REFERENCES certifications(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES domains(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            text TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS question_domains (
            question_id INTEGER NOT NULL,
            domain_id INTEGER NOT NULL,
            PRIMARY KEY (question_id, domain_id),
            FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE,
            FOREIGN KEY (domain_id) REFERENCES domains(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            user_id INTEGER NOT NULL,
            certification_id INTEGER NOT NULL,
            enrolled_at TEXT NOT NULL,
            target_date TEXT,
            PRIMARY KEY (user_id, certification_id),
            FOREIGN KEY (certification_id) REFERENCES certifications(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS performance (
            user_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            times_seen INTEGER NOT NULL CHECK (times_seen >= 0),
            times_correct INTEGER NOT NULL CHECK (times_correct >= 0),
            times_incorrect INTEGER NOT NULL CHECK (times_incorrect >= 0),
            last_seen_at TEXT NOT NULL,
            last_correct_at TEXT,
            avg_response_ms REAL,
            PRIMARY KEY (user_id, question_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS srs_cards (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            ease_factor REAL NOT NULL CHECK (ease_factor >= 1.3),
            interval_days INTEGER NOT NULL CHECK (interval_days >= 0),
            repetitions INTEGER NOT NULL CHECK (repetitions >= 0),
            next_review_at TEXT NOT NULL,
            last_reviewed_at TEXT,
            status TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0,
            UNIQUE (user_id, question_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS srs_review_logs (
            id INTEGER PRIMARY KEY,
            card_id INTEGER NOT NULL,
            quality INTEGER NOT NULL CHECK (quality BETWEEN 0 AND 5),
            reviewed_at TEXT NOT NULL,
            previous_interval_days INTEGER NOT NULL,
            interval_days INTEGER NOT NULL,
            ease_factor REAL NOT NULL,
            FOREIGN KEY (card_id) REFERENCES srs_cards(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS simulations (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            certification_id INTEGER NOT NULL,
            score INTEGER NOT NULL,
            total INTEGER NOT NULL,
            percentage REAL NOT NULL,
            passed INTEGER NOT NULL,
            domain_scores TEXT NOT NULL,
            duration_secs INTEGER,
            completed_at TEXT NOT NULL,
            FOREIGN KEY (certification_id) REFERENCES certifications(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            certification_id INTEGER,
            answered INTEGER NOT NULL,
            correct INTEGER NOT NULL,
            time_spent_secs INTEGER NOT NULL,
            recorded_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_domains_certification
            ON domains (certification_id, code);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_question_domains_domain
            ON question_domains (domain_id, question_id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_srs_cards_user_next_review
            ON srs_cards (user_id, next_review_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_simulations_user_cert_completed
            ON simulations (user_id, certification_id, completed_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_attempts_user_recorded
            ON attempts (user_id, recorded_at);
    ",
];

/// Runs the schema migrations that have not been applied yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: catalog, learner state, simulations and attempts.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
