use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use prep_core::model::{
    Certification, CertificationId, DomainId, SessionBlock, domain_quiz_minutes,
};
use prep_core::readiness::{DomainReadiness, DomainStatus, ReadinessReport};
use prep_core::time::whole_days_between;

use crate::config::EngineConfig;

/// Picks which study blocks to recommend from already-computed state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlanner {
    max_domain_blocks: usize,
    quiz_max_questions: u32,
    cooldown_days: i64,
    prompt_min_coverage: f64,
    simulation_minutes: u32,
}

impl Default for SessionPlanner {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SessionPlanner {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_domain_blocks: config.max_domain_blocks,
            quiz_max_questions: config.domain_quiz_max_questions,
            cooldown_days: config.simulation_cooldown_days,
            prompt_min_coverage: config.simulation_prompt_min_coverage,
            simulation_minutes: domain_quiz_minutes(config.default_simulation_size),
        }
    }

    #[must_use]
    pub fn with_max_domain_blocks(mut self, max: usize) -> Self {
        self.max_domain_blocks = max;
        self
    }

    /// SRS block, present only when cards are due.
    #[must_use]
    pub fn srs_block(&self, due_count: u32) -> Option<SessionBlock> {
        (due_count > 0).then(|| SessionBlock::srs_review(due_count))
    }

    /// Quiz blocks for the weakest non-strong domains that have questions.
    ///
    /// `available` maps a domain to its tagged question count; missing
    /// entries count as zero.
    #[must_use]
    pub fn domain_blocks(
        &self,
        certification_id: CertificationId,
        report: &ReadinessReport,
        available: &BTreeMap<DomainId, u32>,
    ) -> Vec<SessionBlock> {
        weakest_first(&report.domains)
            .into_iter()
            .filter_map(|domain| {
                let pool = available.get(&domain.domain_id).copied().unwrap_or(0);
                (pool > 0).then(|| (domain, pool.min(self.quiz_max_questions)))
            })
            .take(self.max_domain_blocks)
            .zip(0_u32..)
            .map(|((domain, count), rank)| {
                SessionBlock::domain_quiz(rank, certification_id, domain, count)
            })
            .collect()
    }

    /// Simulation prompt: always before the first attempt, afterwards only
    /// once coverage is broad enough and the cooldown has passed.
    #[must_use]
    pub fn simulation_block(
        &self,
        certification: &Certification,
        domain_coverage: f64,
        last_simulation_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<SessionBlock> {
        let first_attempt = match last_simulation_at {
            None => true,
            Some(last) => {
                if domain_coverage < self.prompt_min_coverage
                    || whole_days_between(last, now) < self.cooldown_days
                {
                    return None;
                }
                false
            }
        };
        Some(SessionBlock::simulation_prompt(
            certification,
            first_attempt,
            self.simulation_minutes,
        ))
    }
}

/// Non-strong domains, lowest score first; heavier weight breaks ties.
#[must_use]
pub fn weakest_first(domains: &[DomainReadiness]) -> Vec<&DomainReadiness> {
    let mut out: Vec<&DomainReadiness> = domains
        .iter()
        .filter(|d| d.status != DomainStatus::Strong)
        .collect();
    out.sort_by(|a, b| compare_weakness(a, b));
    out
}

fn compare_weakness(a: &DomainReadiness, b: &DomainReadiness) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then_with(|| b.weight.total_cmp(&a.weight))
        .then_with(|| a.domain_id.cmp(&b.domain_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use prep_core::model::{PassingScore, SessionBlockKind};
    use prep_core::readiness::Trend;
    use prep_core::time::fixed_now;

    fn readiness(id: u64, weight: f64, seen: u32, score: f64) -> DomainReadiness {
        DomainReadiness {
            domain_id: DomainId::new(id),
            code: format!("{id}.0"),
            name: format!("Domain {id}"),
            weight,
            seen,
            correct: 0,
            score,
            status: DomainStatus::classify(seen, score),
        }
    }

    fn report(domains: Vec<DomainReadiness>) -> ReadinessReport {
        ReadinessReport {
            certification_id: CertificationId::new(1),
            overall_score: 0.0,
            passing_pct: 75.0,
            domain_coverage: 0.0,
            domains,
            prediction: None,
            trend: Trend::Stable,
        }
    }

    fn cert() -> Certification {
        Certification::new(
            CertificationId::new(1),
            "SEC",
            "Security",
            PassingScore::Percentage { pct: 75.0 },
        )
        .unwrap()
    }

    #[test]
    fn srs_block_only_when_due() {
        let planner = SessionPlanner::default();
        assert!(planner.srs_block(0).is_none());
        let block = planner.srs_block(12).unwrap();
        assert_eq!(block.priority, 1);
        assert_eq!(block.estimate_minutes, 6);
    }

    #[test]
    fn weakest_domains_with_questions_get_ranked_blocks() {
        let planner = SessionPlanner::default();
        let report = report(vec![
            readiness(1, 0.2, 20, 90.0),
            readiness(2, 0.2, 20, 55.0),
            readiness(3, 0.3, 0, 0.0),
            readiness(4, 0.1, 10, 65.0),
            readiness(5, 0.2, 0, 0.0),
        ]);
        let available = BTreeMap::from([
            (DomainId::new(1), 40),
            (DomainId::new(2), 8),
            (DomainId::new(3), 30),
            (DomainId::new(4), 12),
        ]);

        let blocks = planner.domain_blocks(CertificationId::new(1), &report, &available);
        let picked: Vec<(u32, DomainId, u32)> = blocks
            .iter()
            .map(|b| match &b.kind {
                SessionBlockKind::DomainQuiz {
                    domain_id,
                    question_count,
                    ..
                } => (b.priority, *domain_id, *question_count),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();

        // Domain 5 is unseen but has no questions; domain 1 is strong.
        assert_eq!(
            picked,
            vec![
                (10, DomainId::new(3), 15),
                (11, DomainId::new(2), 8),
                (12, DomainId::new(4), 12),
            ]
        );
        assert_eq!(blocks[0].estimate_minutes, 18);
        assert_eq!(blocks[1].estimate_minutes, 10);
    }

    #[test]
    fn domain_block_cap_is_configurable() {
        let planner = SessionPlanner::default().with_max_domain_blocks(2);
        let report = report(vec![
            readiness(1, 0.3, 0, 0.0),
            readiness(2, 0.3, 0, 0.0),
            readiness(3, 0.4, 0, 0.0),
        ]);
        let available: BTreeMap<DomainId, u32> =
            (1..=3).map(|id| (DomainId::new(id), 3)).collect();
        let blocks = planner.domain_blocks(CertificationId::new(1), &report, &available);
        assert_eq!(blocks.len(), 2);
        // Equal scores: heavier domain first.
        assert!(matches!(
            blocks[0].kind,
            SessionBlockKind::DomainQuiz { domain_id, .. } if domain_id == DomainId::new(3)
        ));
    }

    #[test]
    fn simulation_prompt_rules() {
        let planner = SessionPlanner::default();
        let now = fixed_now();
        let cert = cert();

        let first = planner.simulation_block(&cert, 0.0, None, now).unwrap();
        assert_eq!(first.priority, 50);
        assert!(matches!(
            first.kind,
            SessionBlockKind::SimulationPrompt {
                first_attempt: true,
                ..
            }
        ));

        let recent = Some(now - Duration::days(2));
        assert!(planner.simulation_block(&cert, 0.9, recent, now).is_none());

        let old = Some(now - Duration::days(3));
        assert!(planner.simulation_block(&cert, 0.5, old, now).is_none());
        let repeat = planner.simulation_block(&cert, 0.6, old, now).unwrap();
        assert!(matches!(
            repeat.kind,
            SessionBlockKind::SimulationPrompt {
                first_attempt: false,
                ..
            }
        ));
        assert_eq!(repeat.estimate_minutes, domain_quiz_minutes(90));
    }
}
