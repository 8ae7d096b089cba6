use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use prep_core::evaluator;
use prep_core::model::{
    Answer, AnswerOutcome, CertificationId, DomainId, Question, QuestionId, SampledQuestion,
    SimulationRow, SimulationTally, UserId,
};
use storage::repository::{CatalogRepository, SimulationRepository, StorageError};

use super::sampler::{DomainPool, sample_domain_quiz, sample_simulation};
use crate::Clock;
use crate::blueprint::{DomainGroup, top_level_groups};
use crate::error::SimulationError;

/// A finished mock exam as handed back by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSubmission {
    pub user_id: UserId,
    pub certification_id: CertificationId,
    pub questions: Vec<SampledQuestion>,
    /// Answers keyed by question; absent entries were left blank.
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Answer>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

/// Builds mock exams and domain quizzes, and records finished simulations.
#[derive(Clone)]
pub struct SimulationService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    simulations: Arc<dyn SimulationRepository>,
    scaled_score_proxy_pct: f64,
    default_size: u32,
}

impl SimulationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        simulations: Arc<dyn SimulationRepository>,
        scaled_score_proxy_pct: f64,
        default_size: u32,
    ) -> Self {
        Self {
            clock,
            catalog,
            simulations,
            scaled_score_proxy_pct,
            default_size,
        }
    }

    /// Question pools for every top-level domain of `cert`, subdomains folded in.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::Storage` on read failure.
    pub async fn domain_pools(
        &self,
        cert: CertificationId,
    ) -> Result<Vec<DomainPool>, SimulationError> {
        let domains = self.catalog.get_domains(cert).await?;
        let mut pools = Vec::new();
        for group in top_level_groups(&domains) {
            let questions = self.pooled_questions(&group.member_ids).await?;
            pools.push(DomainPool {
                domain: group.domain,
                questions,
            });
        }
        Ok(pools)
    }

    async fn pooled_questions(&self, domains: &[DomainId]) -> Result<Vec<Question>, StorageError> {
        let mut by_id: BTreeMap<QuestionId, Question> = BTreeMap::new();
        for domain in domains {
            for question in self.catalog.get_question_bank(*domain).await? {
                by_id.entry(question.id).or_insert(question);
            }
        }
        Ok(by_id.into_values().collect())
    }

    /// Draw a shuffled, blueprint-weighted mock exam for `cert`.
    ///
    /// `requested_total` defaults to the configured simulation size. The
    /// result may be shorter when domains lack questions.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::Storage` on read failure.
    pub async fn build_simulation<R: Rng + ?Sized>(
        &self,
        cert: CertificationId,
        requested_total: Option<u32>,
        rng: &mut R,
    ) -> Result<Vec<SampledQuestion>, SimulationError> {
        let requested = requested_total.unwrap_or(self.default_size);
        let pools = self.domain_pools(cert).await?;
        let sample = sample_simulation(&pools, requested, rng);
        info!(
            certification_id = %cert,
            requested,
            delivered = sample.len(),
            "simulation built"
        );
        Ok(sample)
    }

    /// Draw up to `count` questions from one domain and its subdomains.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` (wrapped) if `domain` is not part of
    /// `cert`, or other storage errors.
    pub async fn build_domain_quiz<R: Rng + ?Sized>(
        &self,
        cert: CertificationId,
        domain: DomainId,
        count: u32,
        rng: &mut R,
    ) -> Result<Vec<SampledQuestion>, SimulationError> {
        let domains = self.catalog.get_domains(cert).await?;
        let Some(target) = domains.iter().find(|d| d.id == domain).cloned() else {
            return Err(StorageError::NotFound.into());
        };

        let mut members = vec![target.id];
        let mut frontier = vec![target.id];
        while let Some(parent) = frontier.pop() {
            for child in domains.iter().filter(|d| d.parent_id == Some(parent)) {
                if !members.contains(&child.id) {
                    members.push(child.id);
                    frontier.push(child.id);
                }
            }
        }

        let pool = DomainPool {
            questions: self.pooled_questions(&members).await?,
            domain: target,
        };
        Ok(sample_domain_quiz(&pool, count, rng))
    }

    /// Grade a finished simulation and store it with its performance updates.
    ///
    /// Each question is reloaded and graded against its stored key; ids
    /// missing from the bank or from `cert`'s blueprint are skipped. Blank
    /// answers score as wrong but leave the learner's per-question
    /// statistics untouched. Questions listed twice are graded once.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::Storage` if the certification is missing or
    /// the write fails; nothing is stored in that case.
    pub async fn record_simulation(
        &self,
        submission: &SimulationSubmission,
    ) -> Result<SimulationRow, SimulationError> {
        let cert = self
            .catalog
            .get_certification(submission.certification_id)
            .await?;
        let passing_pct = cert.passing_pct(self.scaled_score_proxy_pct);
        let now = self.clock.now();
        let user = submission.user_id;

        let groups = top_level_groups(&self.catalog.get_domains(cert.id).await?);

        let mut seen: BTreeSet<QuestionId> = BTreeSet::new();
        let mut tally = SimulationTally::new();
        let mut outcomes = Vec::new();
        for sampled in &submission.questions {
            let id = sampled.question.id;
            if !seen.insert(id) {
                continue;
            }

            // Grade against the bank, never the submitted copy.
            let question = match self.catalog.get_question(id).await {
                Ok(q) => q,
                Err(StorageError::NotFound) => {
                    warn!(user_id = %user, question_id = %id, "simulation question not in bank");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let Some(domain_id) = owning_domain(&groups, sampled.domain_id, &question) else {
                warn!(
                    user_id = %user,
                    question_id = %id,
                    certification_id = %cert.id,
                    "simulation question outside certification"
                );
                continue;
            };

            let answer = submission.answers.get(&id);
            let is_correct = evaluator::is_correct(answer, &question.kind);
            tally.add(domain_id, is_correct);
            if answer.is_some() {
                outcomes.push(AnswerOutcome::new(user, id, is_correct, now));
            }
        }

        let result = tally.finish(
            user,
            cert.id,
            passing_pct,
            submission.duration_secs,
            now,
        );
        let id = self
            .simulations
            .record_simulation(&result, &outcomes)
            .await?;

        info!(
            user_id = %user,
            certification_id = %cert.id,
            simulation_id = %id,
            score = result.score,
            total = result.total,
            passed = result.passed,
            "simulation recorded"
        );

        Ok(SimulationRow::new(id, result))
    }
}

/// Top-level domain of `cert` that `question` belongs to, preferring `claimed`.
fn owning_domain(
    groups: &[DomainGroup],
    claimed: DomainId,
    question: &Question,
) -> Option<DomainId> {
    let owners: Vec<DomainId> = groups
        .iter()
        .filter(|g| g.member_ids.iter().any(|m| question.is_tagged(*m)))
        .map(|g| g.domain.id)
        .collect();
    owners
        .iter()
        .copied()
        .find(|&d| d == claimed)
        .or_else(|| owners.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prep_core::model::{Certification, Domain, PassingScore, QuestionKind};
    use prep_core::time::fixed_clock;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use storage::InMemoryRepository;
    use storage::repository::PerformanceRepository;

    async fn seeded() -> (InMemoryRepository, SimulationService) {
        let repo = InMemoryRepository::new();
        let cert = Certification::new(
            CertificationId::new(1),
            "NET",
            "Networking",
            PassingScore::Percentage { pct: 70.0 },
        )
        .unwrap();
        repo.upsert_certification(&cert).await.unwrap();

        let a = Domain::new(DomainId::new(1), cert.id, "1.0", "Media", Some(0.5)).unwrap();
        let b = Domain::new(DomainId::new(2), cert.id, "2.0", "Routing", Some(0.5)).unwrap();
        let b1 = Domain::new(DomainId::new(3), cert.id, "2.1", "BGP", None)
            .unwrap()
            .with_parent(b.id);
        for d in [&a, &b, &b1] {
            repo.upsert_domain(d).await.unwrap();
        }

        for id in 1..=5 {
            let q = Question::new(
                QuestionId::new(id),
                format!("Q{id}"),
                QuestionKind::TrueFalse { correct: vec![0] },
            )
            .with_domains([a.id]);
            repo.upsert_question(&q).await.unwrap();
        }

        let shared = Arc::new(repo.clone());
        let svc = SimulationService::new(fixed_clock(), shared.clone(), shared, 75.0, 90);
        (repo, svc)
    }

    #[tokio::test]
    async fn empty_domain_yields_short_simulation() {
        let (_repo, svc) = seeded().await;
        let mut rng = StdRng::seed_from_u64(1);
        let sample = svc
            .build_simulation(CertificationId::new(1), Some(10), &mut rng)
            .await
            .unwrap();
        assert_eq!(sample.len(), 5);
        assert!(sample.iter().all(|s| s.domain_id == DomainId::new(1)));
    }

    #[tokio::test]
    async fn subdomain_questions_count_toward_parent() {
        let (repo, svc) = seeded().await;
        let q = Question::new(
            QuestionId::new(20),
            "iBGP needs a full mesh",
            QuestionKind::TrueFalse { correct: vec![0] },
        )
        .with_domains([DomainId::new(3)]);
        repo.upsert_question(&q).await.unwrap();

        let pools = svc.domain_pools(CertificationId::new(1)).await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[1].domain.id, DomainId::new(2));
        assert_eq!(pools[1].questions.len(), 1);

        let mut rng = StdRng::seed_from_u64(2);
        let quiz = svc
            .build_domain_quiz(CertificationId::new(1), DomainId::new(2), 15, &mut rng)
            .await
            .unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].domain_code, "2.0");
    }

    #[tokio::test]
    async fn quiz_for_unknown_domain_is_not_found() {
        let (_repo, svc) = seeded().await;
        let mut rng = StdRng::seed_from_u64(0);
        let err = svc
            .build_domain_quiz(CertificationId::new(1), DomainId::new(99), 5, &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::Storage(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn recording_grades_and_updates_answered_questions_only() {
        let (repo, svc) = seeded().await;
        let mut rng = StdRng::seed_from_u64(9);
        let questions = svc
            .build_simulation(CertificationId::new(1), Some(10), &mut rng)
            .await
            .unwrap();

        // Four answered true (correct), one left blank.
        let answers: BTreeMap<QuestionId, Answer> = questions
            .iter()
            .take(4)
            .map(|s| (s.question.id, Answer::TrueFalse(true)))
            .collect();
        let blank = questions[4].question.id;

        let user = UserId::new(5);
        let row = svc
            .record_simulation(&SimulationSubmission {
                user_id: user,
                certification_id: CertificationId::new(1),
                questions,
                answers,
                duration_secs: Some(1200),
            })
            .await
            .unwrap();

        assert_eq!(row.result.score, 4);
        assert_eq!(row.result.total, 5);
        assert!((row.result.percentage - 80.0).abs() < 1e-9);
        assert!(row.result.passed);
        assert_eq!(row.result.domain_scores[&DomainId::new(1)].total, 5);

        assert!(repo.get_performance(user, blank).await.unwrap().is_none());
        assert_eq!(
            repo.user_totals(user).await.unwrap(),
            prep_core::model::PerformanceTotals::new(4, 4)
        );

        let history = repo
            .get_simulation_history(user, CertificationId::new(1), 5)
            .await
            .unwrap();
        assert_eq!(history, vec![row]);
    }

    #[tokio::test]
    async fn recording_ignores_submitted_keys_and_unknown_questions() {
        let (repo, svc) = seeded().await;
        let domain = repo
            .get_domains(CertificationId::new(1))
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.id == DomainId::new(1))
            .unwrap();

        // Stored key says True; the submitted copy claims False.
        let mut tampered = repo.get_question(QuestionId::new(1)).await.unwrap();
        tampered.kind = QuestionKind::TrueFalse { correct: vec![1] };
        let ghost = Question::new(
            QuestionId::new(999),
            "Invented",
            QuestionKind::TrueFalse { correct: vec![0] },
        )
        .with_domains([domain.id]);

        let user = UserId::new(8);
        let answers = BTreeMap::from([
            (QuestionId::new(1), Answer::TrueFalse(false)),
            (QuestionId::new(999), Answer::TrueFalse(true)),
        ]);
        let row = svc
            .record_simulation(&SimulationSubmission {
                user_id: user,
                certification_id: CertificationId::new(1),
                questions: vec![
                    SampledQuestion::new(tampered, &domain),
                    SampledQuestion::new(ghost, &domain),
                ],
                answers,
                duration_secs: None,
            })
            .await
            .unwrap();

        assert_eq!(row.result.total, 1);
        assert_eq!(row.result.score, 0);
        assert!(!row.result.passed);
        assert!(
            repo.get_performance(user, QuestionId::new(999))
                .await
                .unwrap()
                .is_none()
        );
        let graded = repo
            .get_performance(user, QuestionId::new(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(graded.times_incorrect, 1);
    }
}
