use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CertificationId, DomainId, UserId};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DomainError {
    #[error("domain weight must be a finite value in [0, 1], got {0}")]
    InvalidWeight(f64),
    #[error("passing percentage must be in (0, 100], got {0}")]
    InvalidPassingPercentage(f64),
}

//
// ─── DOMAIN ────────────────────────────────────────────────────────────────────
//

/// A weighted topic area of a certification's exam blueprint.
///
/// Domains form at most a two-level hierarchy: a top-level domain has no
/// `parent_id`, a sub-domain points at its top-level parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub certification_id: CertificationId,
    pub code: String,
    pub name: String,
    pub weight: Option<f64>,
    pub parent_id: Option<DomainId>,
}

impl Domain {
    /// Build a top-level domain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidWeight` if `weight` is present but outside `[0, 1]`.
    pub fn new(
        id: DomainId,
        certification_id: CertificationId,
        code: impl Into<String>,
        name: impl Into<String>,
        weight: Option<f64>,
    ) -> Result<Self, DomainError> {
        if let Some(w) = weight {
            if !w.is_finite() || !(0.0..=1.0).contains(&w) {
                return Err(DomainError::InvalidWeight(w));
            }
        }
        Ok(Self {
            id,
            certification_id,
            code: code.into(),
            name: name.into(),
            weight,
            parent_id: None,
        })
    }

    #[must_use]
    pub fn with_parent(mut self, parent: DomainId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The configured weight, or a uniform share of `domain_count` when unset.
    #[must_use]
    pub fn effective_weight(&self, domain_count: usize) -> f64 {
        match self.weight {
            Some(w) => w,
            None if domain_count == 0 => 0.0,
            #[allow(clippy::cast_precision_loss)]
            None => 1.0 / domain_count as f64,
        }
    }
}

//
// ─── CERTIFICATION ─────────────────────────────────────────────────────────────
//

/// How a certification reports its passing bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassingScore {
    Percentage { pct: f64 },
    Scaled { passing: u32, max: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub id: CertificationId,
    pub code: String,
    pub name: String,
    pub passing_score: PassingScore,
}

impl Certification {
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPassingPercentage` for a percentage outside `(0, 100]`.
    pub fn new(
        id: CertificationId,
        code: impl Into<String>,
        name: impl Into<String>,
        passing_score: PassingScore,
    ) -> Result<Self, DomainError> {
        if let PassingScore::Percentage { pct } = passing_score {
            if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
                return Err(DomainError::InvalidPassingPercentage(pct));
            }
        }
        Ok(Self {
            id,
            code: code.into(),
            name: name.into(),
            passing_score,
        })
    }

    /// Passing bar as a percentage.
    ///
    /// Scaled scores do not map linearly onto percent correct, so they are
    /// replaced by `scaled_proxy_pct`.
    #[must_use]
    pub fn passing_pct(&self, scaled_proxy_pct: f64) -> f64 {
        match self.passing_score {
            PassingScore::Percentage { pct } => pct,
            PassingScore::Scaled { .. } => scaled_proxy_pct,
        }
    }
}

//
// ─── ENROLLMENT ────────────────────────────────────────────────────────────────
//

/// A learner's enrollment in a certification track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub user_id: UserId,
    pub certification_id: CertificationId,
    pub enrolled_at: DateTime<Utc>,
    pub target_date: Option<NaiveDate>,
}

impl Enrollment {
    #[must_use]
    pub fn new(
        user_id: UserId,
        certification_id: CertificationId,
        enrolled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            certification_id,
            enrolled_at,
            target_date: None,
        }
    }

    #[must_use]
    pub fn with_target_date(mut self, target: NaiveDate) -> Self {
        self.target_date = Some(target);
        self
    }
}
