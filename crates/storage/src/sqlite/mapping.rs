use chrono::{DateTime, Utc};
use prep_core::model::{
    CardId, CardStatus, Certification, CertificationId, Domain, DomainId, PerformanceRecord,
    QuestionId, QuestionKind, SimulationId, SimulationResult, SimulationRow, SrsCard, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn domain_id_from_i64(v: i64) -> Result<DomainId, StorageError> {
    Ok(DomainId::new(i64_to_u64("domain_id", v)?))
}

pub(crate) fn certification_id_from_i64(v: i64) -> Result<CertificationId, StorageError> {
    Ok(CertificationId::new(i64_to_u64("certification_id", v)?))
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<CardId, StorageError> {
    Ok(CardId::new(i64_to_u64("card_id", v)?))
}

pub(crate) fn simulation_id_from_i64(v: i64) -> Result<SimulationId, StorageError> {
    Ok(SimulationId::new(i64_to_u64("simulation_id", v)?))
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

pub(crate) fn map_certification_row(row: &SqliteRow) -> Result<Certification, StorageError> {
    let passing: String = row.try_get("passing_score").map_err(ser)?;
    Certification::new(
        certification_id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("code").map_err(ser)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        serde_json::from_str(&passing).map_err(ser)?,
    )
    .map_err(|e| ser(prep_core::Error::from(e)))
}

pub(crate) fn map_domain_row(row: &SqliteRow) -> Result<Domain, StorageError> {
    let domain = Domain::new(
        domain_id_from_i64(row.try_get("id").map_err(ser)?)?,
        certification_id_from_i64(row.try_get("certification_id").map_err(ser)?)?,
        row.try_get::<String, _>("code").map_err(ser)?,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<Option<f64>, _>("weight").map_err(ser)?,
    )
    .map_err(|e| ser(prep_core::Error::from(e)))?;

    match row.try_get::<Option<i64>, _>("parent_id").map_err(ser)? {
        Some(parent) => Ok(domain.with_parent(domain_id_from_i64(parent)?)),
        None => Ok(domain),
    }
}

/// Stored payload for a question kind. Unsupported kinds carry no payload.
pub(crate) fn encode_question_kind(kind: &QuestionKind) -> Result<String, StorageError> {
    match kind {
        QuestionKind::Unsupported { .. } => Ok("{}".to_owned()),
        _ => serde_json::to_string(kind).map_err(ser),
    }
}

/// Decode a stored question kind. Unknown tags and unreadable payloads
/// become `Unsupported`, which always grades as incorrect.
pub(crate) fn decode_question_kind(id: QuestionId, kind: &str, payload: &str) -> QuestionKind {
    match serde_json::from_str::<QuestionKind>(payload) {
        Ok(parsed) if parsed.as_str() == kind => parsed,
        Ok(_) | Err(_) => {
            tracing::warn!(question_id = %id, kind, "question payload not decodable");
            QuestionKind::Unsupported {
                kind: kind.to_owned(),
            }
        }
    }
}

//
// ─── LEARNER STATE ─────────────────────────────────────────────────────────────
//

pub(crate) fn map_performance_row(row: &SqliteRow) -> Result<PerformanceRecord, StorageError> {
    Ok(PerformanceRecord {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        question_id: question_id_from_i64(row.try_get("question_id").map_err(ser)?)?,
        times_seen: u32_from_i64("times_seen", row.try_get("times_seen").map_err(ser)?)?,
        times_correct: u32_from_i64("times_correct", row.try_get("times_correct").map_err(ser)?)?,
        times_incorrect: u32_from_i64(
            "times_incorrect",
            row.try_get("times_incorrect").map_err(ser)?,
        )?,
        last_seen_at: row.try_get("last_seen_at").map_err(ser)?,
        last_correct_at: row.try_get("last_correct_at").map_err(ser)?,
        avg_response_ms: row.try_get("avg_response_ms").map_err(ser)?,
    })
}

pub(crate) fn parse_card_status(s: &str) -> Result<CardStatus, StorageError> {
    CardStatus::parse(s).ok_or_else(|| StorageError::Serialization(format!("invalid status: {s}")))
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<SrsCard, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let next_review_at: DateTime<Utc> = row.try_get("next_review_at").map_err(ser)?;

    SrsCard::from_persisted(
        card_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        question_id_from_i64(row.try_get("question_id").map_err(ser)?)?,
        row.try_get("ease_factor").map_err(ser)?,
        u32_from_i64("interval_days", row.try_get("interval_days").map_err(ser)?)?,
        u32_from_i64("repetitions", row.try_get("repetitions").map_err(ser)?)?,
        next_review_at,
        row.try_get("last_reviewed_at").map_err(ser)?,
        parse_card_status(&status)?,
        u32_from_i64("revision", row.try_get("revision").map_err(ser)?)?,
    )
    .map_err(|e| ser(prep_core::Error::from(e)))
}

pub(crate) fn map_simulation_row(row: &SqliteRow) -> Result<SimulationRow, StorageError> {
    let domain_scores: String = row.try_get("domain_scores").map_err(ser)?;
    let duration: Option<i64> = row.try_get("duration_secs").map_err(ser)?;

    let result = SimulationResult {
        user_id: user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        certification_id: certification_id_from_i64(
            row.try_get("certification_id").map_err(ser)?,
        )?,
        score: u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
        total: u32_from_i64("total", row.try_get("total").map_err(ser)?)?,
        percentage: row.try_get("percentage").map_err(ser)?,
        passed: row.try_get("passed").map_err(ser)?,
        domain_scores: serde_json::from_str(&domain_scores).map_err(ser)?,
        duration_secs: duration
            .map(|d| u32_from_i64("duration_secs", d))
            .transpose()?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    };

    Ok(SimulationRow::new(
        simulation_id_from_i64(row.try_get("id").map_err(ser)?)?,
        result,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::MatchPair;

    #[test]
    fn question_kind_survives_storage_encoding() {
        let kind = QuestionKind::Matching {
            pairs: vec![MatchPair::new("a", "1")],
        };
        let payload = encode_question_kind(&kind).unwrap();
        assert_eq!(
            decode_question_kind(QuestionId::new(1), "matching", &payload),
            kind
        );
    }

    #[test]
    fn unknown_or_mismatched_kinds_decode_as_unsupported() {
        let decoded = decode_question_kind(QuestionId::new(1), "hotspot", "{}");
        assert_eq!(
            decoded,
            QuestionKind::Unsupported {
                kind: "hotspot".into()
            }
        );

        let payload = encode_question_kind(&QuestionKind::TrueFalse { correct: vec![0] }).unwrap();
        assert!(!decode_question_kind(QuestionId::new(1), "choice", &payload).is_supported());
    }

    #[test]
    fn ids_reject_negative_values() {
        assert!(user_id_from_i64(-1).is_err());
        assert_eq!(card_id_from_i64(7).unwrap(), CardId::new(7));
        assert!(id_i64("user_id", u64::MAX).is_err());
    }
}
