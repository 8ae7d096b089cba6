use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::CardId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur during review operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("review quality must be an integer in [0, 5], got {0}")]
    InvalidQuality(i64),
}

//
// ─── REVIEW QUALITY ───────────────────────────────────────────────────────────
//

/// SM-2 recall quality on the 0–5 scale.
///
/// 0–2 are failed recalls; 3–5 are passes of increasing ease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ReviewQuality(u8);

impl ReviewQuality {
    /// Lowest quality that counts as a successful recall.
    pub const PASS_THRESHOLD: u8 = 3;

    /// Validate a raw quality value.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidQuality` if the value is not in `0..=5`.
    pub fn new(value: i64) -> Result<Self, ReviewError> {
        match u8::try_from(value) {
            Ok(v) if v <= 5 => Ok(Self(v)),
            _ => Err(ReviewError::InvalidQuality(value)),
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_pass(self) -> bool {
        self.0 >= Self::PASS_THRESHOLD
    }
}

impl TryFrom<i64> for ReviewQuality {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReviewQuality> for i64 {
    fn from(q: ReviewQuality) -> Self {
        i64::from(q.0)
    }
}

//
// ─── REVIEW LOG ───────────────────────────────────────────────────────────────
//

/// Record of a single card review event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
    pub card_id: CardId,
    pub quality: ReviewQuality,
    pub reviewed_at: DateTime<Utc>,
    pub previous_interval_days: u32,
    pub interval_days: u32,
    pub ease_factor: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_zero_through_five() {
        for v in 0..=5 {
            assert_eq!(ReviewQuality::new(v).unwrap().value(), v as u8);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(ReviewQuality::new(6), Err(ReviewError::InvalidQuality(6)));
        assert_eq!(ReviewQuality::new(-1), Err(ReviewError::InvalidQuality(-1)));
        assert_eq!(ReviewQuality::new(300), Err(ReviewError::InvalidQuality(300)));
    }

    #[test]
    fn pass_threshold_is_three() {
        assert!(!ReviewQuality::new(2).unwrap().is_pass());
        assert!(ReviewQuality::new(3).unwrap().is_pass());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<ReviewQuality>("4").is_ok());
        assert!(serde_json::from_str::<ReviewQuality>("9").is_err());
    }
}
