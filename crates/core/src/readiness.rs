//! Readiness scoring and pass prediction.
//!
//! Pure functions over already-aggregated inputs: per-domain performance
//! totals and recent simulation percentages (most recent first).

use serde::{Deserialize, Serialize};

use crate::model::{CertificationId, Domain, DomainId, PerformanceTotals};

/// Domains at or above this score are "strong".
pub const STRONG_SCORE: f64 = 80.0;
/// Domains at or above this score (and below strong) are "moderate".
pub const MODERATE_SCORE: f64 = 60.0;
/// Percentage-point change between simulations that counts as a trend.
pub const TREND_THRESHOLD: f64 = 3.0;
/// Simulations needed before a trend is reported.
pub const TREND_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    Unseen,
    Weak,
    Moderate,
    Strong,
}

impl DomainStatus {
    #[must_use]
    pub fn classify(seen: u32, score: f64) -> Self {
        if seen == 0 {
            DomainStatus::Unseen
        } else if score >= STRONG_SCORE {
            DomainStatus::Strong
        } else if score >= MODERATE_SCORE {
            DomainStatus::Moderate
        } else {
            DomainStatus::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainReadiness {
    pub domain_id: DomainId,
    pub code: String,
    pub name: String,
    pub weight: f64,
    pub seen: u32,
    pub correct: u32,
    pub score: f64,
    pub status: DomainStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub likely_pass: bool,
    pub confidence: Confidence,
    pub average_simulation_pct: f64,
    pub simulations_considered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub certification_id: CertificationId,
    pub overall_score: f64,
    pub passing_pct: f64,
    pub domain_coverage: f64,
    pub domains: Vec<DomainReadiness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    pub trend: Trend,
}

impl ReadinessReport {
    #[must_use]
    pub fn domain(&self, id: DomainId) -> Option<&DomainReadiness> {
        self.domains.iter().find(|d| d.domain_id == id)
    }
}

/// Readiness scoring parameters for one certification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessModel {
    passing_pct: f64,
    coverage_min_samples: u32,
    prediction_window: usize,
}

impl ReadinessModel {
    #[must_use]
    pub fn new(passing_pct: f64) -> Self {
        Self {
            passing_pct,
            coverage_min_samples: 10,
            prediction_window: 5,
        }
    }

    #[must_use]
    pub fn with_coverage_min_samples(mut self, samples: u32) -> Self {
        self.coverage_min_samples = samples;
        self
    }

    #[must_use]
    pub fn with_prediction_window(mut self, window: usize) -> Self {
        self.prediction_window = window.max(1);
        self
    }

    #[must_use]
    pub fn passing_pct(&self) -> f64 {
        self.passing_pct
    }

    /// Score every domain and build the full report.
    ///
    /// `recent_pcts` holds simulation percentages, most recent first. The
    /// prediction reads the first `prediction_window` of them; the trend
    /// reads up to [`TREND_SAMPLES`] regardless of the window.
    #[must_use]
    pub fn assess(
        &self,
        certification_id: CertificationId,
        domains: &[(Domain, PerformanceTotals)],
        recent_pcts: &[f64],
    ) -> ReadinessReport {
        let scored: Vec<DomainReadiness> = domains
            .iter()
            .map(|(domain, totals)| {
                let score = totals.percent_correct();
                DomainReadiness {
                    domain_id: domain.id,
                    code: domain.code.clone(),
                    name: domain.name.clone(),
                    weight: domain.effective_weight(domains.len()),
                    seen: totals.seen,
                    correct: totals.correct,
                    score,
                    status: DomainStatus::classify(totals.seen, score),
                }
            })
            .collect();

        let domain_coverage = self.coverage(&scored);
        let window = &recent_pcts[..recent_pcts.len().min(self.prediction_window)];

        ReadinessReport {
            certification_id,
            overall_score: weighted_overall(&scored),
            passing_pct: self.passing_pct,
            domain_coverage,
            prediction: self.predict(window, domain_coverage),
            trend: trend(recent_pcts),
            domains: scored,
        }
    }

    /// Fraction of domains with at least `coverage_min_samples` answers.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self, domains: &[DomainReadiness]) -> f64 {
        if domains.is_empty() {
            return 0.0;
        }
        let covered = domains
            .iter()
            .filter(|d| d.seen >= self.coverage_min_samples)
            .count();
        covered as f64 / domains.len() as f64
    }

    /// Pass prediction from recent simulation percentages.
    ///
    /// Returns `None` without any simulation history.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, recent_pcts: &[f64], coverage: f64) -> Option<Prediction> {
        if recent_pcts.is_empty() {
            return None;
        }
        let avg = recent_pcts.iter().sum::<f64>() / recent_pcts.len() as f64;
        let pass = self.passing_pct;

        let (likely_pass, confidence) = if recent_pcts.len() == 1 {
            (avg >= pass, Confidence::Low)
        } else if avg >= pass + 5.0 && coverage >= 0.7 {
            let confidence = if avg >= pass + 15.0 && coverage >= 0.9 {
                Confidence::High
            } else {
                Confidence::Moderate
            };
            (true, confidence)
        } else if avg >= pass && coverage >= 0.5 {
            (true, Confidence::Low)
        } else if avg >= pass - 10.0 {
            (false, Confidence::Moderate)
        } else {
            (false, Confidence::High)
        };

        Some(Prediction {
            likely_pass,
            confidence,
            average_simulation_pct: avg,
            simulations_considered: recent_pcts.len(),
        })
    }
}

/// Weight-weighted mean of domain scores; zero-weight domains drop out of
/// the denominator, unseen domains contribute a score of zero.
#[must_use]
pub fn weighted_overall(domains: &[DomainReadiness]) -> f64 {
    let (num, den) = domains
        .iter()
        .filter(|d| d.weight > 0.0)
        .fold((0.0, 0.0), |(num, den), d| {
            (num + d.weight * d.score, den + d.weight)
        });
    if den > 0.0 { num / den } else { 0.0 }
}

/// Compare the most recent simulation with the third most recent.
#[must_use]
pub fn trend(recent_pcts: &[f64]) -> Trend {
    match (recent_pcts.first(), recent_pcts.get(TREND_SAMPLES - 1)) {
        (Some(latest), Some(older)) => {
            let delta = latest - older;
            if delta > TREND_THRESHOLD {
                Trend::Improving
            } else if delta < -TREND_THRESHOLD {
                Trend::Declining
            } else {
                Trend::Stable
            }
        }
        _ => Trend::Stable,
    }
}
