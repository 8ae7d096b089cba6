//! Engine tuning knobs, loadable from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunable engine parameters. Missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Passing percentage used for certifications reporting a scaled score.
    #[serde(default = "default_scaled_score_proxy_pct")]
    pub scaled_score_proxy_pct: f64,
    /// Number of most recent simulations the predictor averages.
    #[serde(default = "default_prediction_window")]
    pub prediction_window: usize,
    /// Answers needed before a domain counts as covered.
    #[serde(default = "default_coverage_min_samples")]
    pub coverage_min_samples: u32,
    /// Upper bound on due-card lookups.
    #[serde(default = "default_srs_due_limit")]
    pub srs_due_limit: u32,
    /// Most domain-quiz blocks in one session plan.
    #[serde(default = "default_max_domain_blocks")]
    pub max_domain_blocks: usize,
    #[serde(default = "default_domain_quiz_max_questions")]
    pub domain_quiz_max_questions: u32,
    /// Days to wait after a simulation before prompting another.
    #[serde(default = "default_simulation_cooldown_days")]
    pub simulation_cooldown_days: i64,
    /// Domain coverage required before prompting a repeat simulation.
    #[serde(default = "default_simulation_prompt_min_coverage")]
    pub simulation_prompt_min_coverage: f64,
    #[serde(default = "default_study_hours_window_days")]
    pub study_hours_window_days: i64,
    /// Give missed practice questions an SRS card.
    #[serde(default = "default_enroll_missed_in_srs")]
    pub enroll_missed_in_srs: bool,
    /// Simulation length when the caller does not ask for one.
    #[serde(default = "default_simulation_size")]
    pub default_simulation_size: u32,
}

fn default_scaled_score_proxy_pct() -> f64 {
    75.0
}
fn default_prediction_window() -> usize {
    5
}
fn default_coverage_min_samples() -> u32 {
    10
}
fn default_srs_due_limit() -> u32 {
    100
}
fn default_max_domain_blocks() -> usize {
    3
}
fn default_domain_quiz_max_questions() -> u32 {
    15
}
fn default_simulation_cooldown_days() -> i64 {
    3
}
fn default_simulation_prompt_min_coverage() -> f64 {
    0.6
}
fn default_study_hours_window_days() -> i64 {
    7
}
fn default_enroll_missed_in_srs() -> bool {
    true
}
fn default_simulation_size() -> u32 {
    90
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scaled_score_proxy_pct: default_scaled_score_proxy_pct(),
            prediction_window: default_prediction_window(),
            coverage_min_samples: default_coverage_min_samples(),
            srs_due_limit: default_srs_due_limit(),
            max_domain_blocks: default_max_domain_blocks(),
            domain_quiz_max_questions: default_domain_quiz_max_questions(),
            simulation_cooldown_days: default_simulation_cooldown_days(),
            simulation_prompt_min_coverage: default_simulation_prompt_min_coverage(),
            study_hours_window_days: default_study_hours_window_days(),
            enroll_missed_in_srs: default_enroll_missed_in_srs(),
            default_simulation_size: default_simulation_size(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML or mistyped values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, or
    /// `ConfigError::Parse` if it is not valid config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.prediction_window, 5);
        assert_eq!(config.coverage_min_samples, 10);
        assert!(config.enroll_missed_in_srs);
    }

    #[test]
    fn partial_document_overrides_named_keys() {
        let config = EngineConfig::from_toml_str(
            r"
                max_domain_blocks = 2
                simulation_cooldown_days = 5
                enroll_missed_in_srs = false
            ",
        )
        .unwrap();
        assert_eq!(config.max_domain_blocks, 2);
        assert_eq!(config.simulation_cooldown_days, 5);
        assert!(!config.enroll_missed_in_srs);
        assert_eq!(config.domain_quiz_max_questions, 15);
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let err = EngineConfig::from_toml_str("prediction_window = \"five\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::load(Path::new("/nonexistent/prep.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/prep.toml"));
    }
}
