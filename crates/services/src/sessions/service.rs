use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use prep_core::model::{CertificationSummary, SessionContext, SessionPlan, UserId};
use prep_core::readiness::DomainStatus;
use prep_core::time::{Clock, days_until};
use storage::repository::{
    AttemptRepository, CatalogRepository, EnrollmentRepository, PerformanceRepository,
    SimulationRepository, SrsCardRepository,
};

use super::plan::SessionPlanner;
use crate::blueprint::top_level_groups;
use crate::config::EngineConfig;
use crate::error::PlanError;
use crate::readiness_service::ReadinessService;

const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Assembles a learner's session plan from storage.
#[derive(Clone)]
pub struct SessionPlanService {
    clock: Clock,
    enrollments: Arc<dyn EnrollmentRepository>,
    catalog: Arc<dyn CatalogRepository>,
    cards: Arc<dyn SrsCardRepository>,
    performance: Arc<dyn PerformanceRepository>,
    simulations: Arc<dyn SimulationRepository>,
    attempts: Arc<dyn AttemptRepository>,
    readiness: ReadinessService,
    planner: SessionPlanner,
    scaled_score_proxy_pct: f64,
    study_window_days: i64,
}

impl SessionPlanService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        clock: Clock,
        enrollments: Arc<dyn EnrollmentRepository>,
        catalog: Arc<dyn CatalogRepository>,
        cards: Arc<dyn SrsCardRepository>,
        performance: Arc<dyn PerformanceRepository>,
        simulations: Arc<dyn SimulationRepository>,
        attempts: Arc<dyn AttemptRepository>,
        readiness: ReadinessService,
        config: &EngineConfig,
    ) -> Self {
        Self {
            clock,
            enrollments,
            catalog,
            cards,
            performance,
            simulations,
            attempts,
            readiness,
            planner: SessionPlanner::from_config(config),
            scaled_score_proxy_pct: config.scaled_score_proxy_pct,
            study_window_days: config.study_hours_window_days,
        }
    }

    /// Build the ranked study plan for `user`.
    ///
    /// Domain quizzes and the simulation prompt target the learner's most
    /// recently enrolled certification; without an enrollment only the SRS
    /// block can appear.
    ///
    /// # Errors
    ///
    /// Returns `PlanError` if any read fails.
    pub async fn build_session_plan(&self, user: UserId) -> Result<SessionPlan, PlanError> {
        let now = self.clock.now();

        let due = self.cards.count_due(user, now).await?;
        let mut blocks: Vec<_> = self.planner.srs_block(due).into_iter().collect();

        let totals = self.performance.user_totals(user).await?;
        let since = now - Duration::days(self.study_window_days);
        let study_secs = self.attempts.study_seconds_since(user, since).await?;

        let mut context = SessionContext {
            recent_study_hours: round_tenths(study_hours(study_secs)),
            has_history: totals.seen > 0,
            total_questions_answered: totals.seen,
            overall_accuracy: totals.percent_correct(),
            ..SessionContext::default()
        };

        if let Some(enrollment) = self.enrollments.latest_enrollment(user).await? {
            let cert = self
                .catalog
                .get_certification(enrollment.certification_id)
                .await?;
            let report = self.readiness.compute_readiness(user, cert.id).await?;

            let domains = self.catalog.get_domains(cert.id).await?;
            let mut available = BTreeMap::new();
            for group in top_level_groups(&domains) {
                let strong = report
                    .domain(group.domain.id)
                    .is_some_and(|d| d.status == DomainStatus::Strong);
                if !strong {
                    let count = self.catalog.count_questions(&group.member_ids).await?;
                    available.insert(group.domain.id, count);
                }
            }
            blocks.extend(self.planner.domain_blocks(cert.id, &report, &available));

            let last = self
                .simulations
                .get_simulation_history(user, cert.id, 1)
                .await?
                .into_iter()
                .next()
                .map(|row| row.result.completed_at);
            blocks.extend(
                self.planner
                    .simulation_block(&cert, report.domain_coverage, last, now),
            );

            context.certification = Some(CertificationSummary {
                id: cert.id,
                code: cert.code.clone(),
                name: cert.name.clone(),
                passing_pct: cert.passing_pct(self.scaled_score_proxy_pct),
            });
            context.target_date = enrollment.target_date;
            context.days_to_target = enrollment
                .target_date
                .map(|target| days_until(self.clock.today(), target));
            context.overall_readiness = Some(report.overall_score);
            context.has_history |= last.is_some();
        }

        let plan = SessionPlan::new(blocks, context);
        debug!(user_id = %user, blocks = plan.blocks.len(), due, "session plan built");
        Ok(plan)
    }
}

#[allow(clippy::cast_precision_loss)]
fn study_hours(seconds: u64) -> f64 {
    seconds as f64 / SECONDS_PER_HOUR
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
