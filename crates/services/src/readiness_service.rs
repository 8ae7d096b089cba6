use std::sync::Arc;

use tracing::debug;

use prep_core::model::{Certification, CertificationId, UserId};
use prep_core::readiness::{ReadinessModel, ReadinessReport, TREND_SAMPLES};
use storage::repository::{CatalogRepository, PerformanceRepository, SimulationRepository};

use crate::blueprint::top_level_groups;
use crate::config::EngineConfig;
use crate::error::ReadinessError;

/// Scores a learner against a certification blueprint.
#[derive(Clone)]
pub struct ReadinessService {
    catalog: Arc<dyn CatalogRepository>,
    performance: Arc<dyn PerformanceRepository>,
    simulations: Arc<dyn SimulationRepository>,
    scaled_score_proxy_pct: f64,
    coverage_min_samples: u32,
    prediction_window: usize,
}

impl ReadinessService {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        performance: Arc<dyn PerformanceRepository>,
        simulations: Arc<dyn SimulationRepository>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            catalog,
            performance,
            simulations,
            scaled_score_proxy_pct: config.scaled_score_proxy_pct,
            coverage_min_samples: config.coverage_min_samples,
            prediction_window: config.prediction_window.max(1),
        }
    }

    /// Scoring parameters for `cert`.
    #[must_use]
    pub fn model_for(&self, cert: &Certification) -> ReadinessModel {
        ReadinessModel::new(cert.passing_pct(self.scaled_score_proxy_pct))
            .with_coverage_min_samples(self.coverage_min_samples)
            .with_prediction_window(self.prediction_window)
    }

    /// Per-domain scores, weighted overall score, and (with simulation
    /// history) a pass prediction and trend.
    ///
    /// Subdomain performance counts toward its top-level domain.
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError::Storage` if the certification is missing or a
    /// read fails.
    pub async fn compute_readiness(
        &self,
        user: UserId,
        cert: CertificationId,
    ) -> Result<ReadinessReport, ReadinessError> {
        let certification = self.catalog.get_certification(cert).await?;
        let domains = self.catalog.get_domains(cert).await?;

        let mut scored = Vec::new();
        for group in top_level_groups(&domains) {
            let totals = self
                .performance
                .totals_for_domains(user, &group.member_ids)
                .await?;
            scored.push((group.domain, totals));
        }

        let window = self.prediction_window.max(TREND_SAMPLES);
        let window = u32::try_from(window).unwrap_or(u32::MAX);
        let recent: Vec<f64> = self
            .simulations
            .get_simulation_history(user, cert, window)
            .await?
            .into_iter()
            .map(|row| row.result.percentage)
            .collect();

        let report = self
            .model_for(&certification)
            .assess(cert, &scored, &recent);
        debug!(
            user_id = %user,
            certification_id = %cert,
            overall = report.overall_score,
            coverage = report.domain_coverage,
            simulations = recent.len(),
            "readiness computed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::{
        AnswerOutcome, Domain, DomainId, PassingScore, Question, QuestionId, QuestionKind,
        SimulationTally,
    };
    use prep_core::readiness::{Confidence, DomainStatus, Trend};
    use prep_core::time::fixed_now;
    use storage::InMemoryRepository;

    fn user() -> UserId {
        UserId::new(1)
    }

    async fn seeded() -> (InMemoryRepository, ReadinessService) {
        let repo = InMemoryRepository::new();
        let cert = Certification::new(
            CertificationId::new(1),
            "SEC",
            "Security",
            PassingScore::Scaled {
                passing: 750,
                max: 900,
            },
        )
        .unwrap();
        repo.upsert_certification(&cert).await.unwrap();

        let a = Domain::new(DomainId::new(1), cert.id, "1.0", "Threats", Some(0.5)).unwrap();
        let b = Domain::new(DomainId::new(2), cert.id, "2.0", "Crypto", Some(0.5)).unwrap();
        let b1 = Domain::new(DomainId::new(3), cert.id, "2.1", "PKI", None)
            .unwrap()
            .with_parent(b.id);
        for d in [&a, &b, &b1] {
            repo.upsert_domain(d).await.unwrap();
        }
        for (id, domain) in [(1, a.id), (2, b1.id)] {
            let q = Question::new(
                QuestionId::new(id),
                format!("Q{id}"),
                QuestionKind::TrueFalse { correct: vec![0] },
            )
            .with_domains([domain]);
            repo.upsert_question(&q).await.unwrap();
        }

        let shared = Arc::new(repo.clone());
        let svc = ReadinessService::new(
            shared.clone(),
            shared.clone(),
            shared,
            &EngineConfig::default(),
        );
        (repo, svc)
    }

    async fn simulate(repo: &InMemoryRepository, day: i64, correct: u32) {
        let mut tally = SimulationTally::new();
        for i in 0..100 {
            tally.add(DomainId::new(1), i < correct);
        }
        let result = tally.finish(
            user(),
            CertificationId::new(1),
            75.0,
            None,
            fixed_now() + Duration::days(day),
        );
        repo.record_simulation(&result, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn no_history_means_no_prediction() {
        let (_repo, svc) = seeded().await;
        let report = svc
            .compute_readiness(user(), CertificationId::new(1))
            .await
            .unwrap();
        assert!(report.prediction.is_none());
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(report.passing_pct, 75.0);
        assert_eq!(report.domains.len(), 2);
        assert!(report.domains.iter().all(|d| d.status == DomainStatus::Unseen));
        assert_eq!(report.overall_score, 0.0);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("prediction").is_none());
    }

    #[tokio::test]
    async fn subdomain_answers_roll_into_parent_score() {
        let (repo, svc) = seeded().await;
        for (i, correct) in [true, true, true, false].into_iter().enumerate() {
            let at = fixed_now() + Duration::minutes(i64::try_from(i).unwrap());
            repo.upsert_performance(&AnswerOutcome::new(user(), QuestionId::new(2), correct, at))
                .await
                .unwrap();
        }

        let report = svc
            .compute_readiness(user(), CertificationId::new(1))
            .await
            .unwrap();
        let crypto = report.domain(DomainId::new(2)).unwrap();
        assert_eq!(crypto.seen, 4);
        assert!((crypto.score - 75.0).abs() < 1e-9);
        assert_eq!(crypto.status, DomainStatus::Moderate);
        // Unseen domain 1.0 still counts as zero.
        assert!((report.overall_score - 37.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn history_drives_prediction_and_trend() {
        let (repo, svc) = seeded().await;
        simulate(&repo, 0, 60).await;
        simulate(&repo, 1, 70).await;
        simulate(&repo, 2, 80).await;

        let report = svc
            .compute_readiness(user(), CertificationId::new(1))
            .await
            .unwrap();
        let prediction = report.prediction.unwrap();
        assert_eq!(prediction.simulations_considered, 3);
        assert!((prediction.average_simulation_pct - 70.0).abs() < 1e-9);
        assert!(!prediction.likely_pass);
        assert_eq!(prediction.confidence, Confidence::Moderate);
        assert_eq!(report.trend, Trend::Improving);
    }

    #[tokio::test]
    async fn narrow_window_keeps_trend_history() {
        let (repo, _svc) = seeded().await;
        simulate(&repo, 0, 90).await;
        simulate(&repo, 1, 80).await;
        simulate(&repo, 2, 70).await;

        let shared = Arc::new(repo.clone());
        let config = EngineConfig {
            prediction_window: 1,
            ..EngineConfig::default()
        };
        let svc = ReadinessService::new(shared.clone(), shared.clone(), shared, &config);
        let report = svc
            .compute_readiness(user(), CertificationId::new(1))
            .await
            .unwrap();
        let prediction = report.prediction.unwrap();
        assert_eq!(prediction.simulations_considered, 1);
        assert!((prediction.average_simulation_pct - 70.0).abs() < 1e-9);
        assert_eq!(report.trend, Trend::Declining);
    }
}
