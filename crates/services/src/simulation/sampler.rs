//! Weighted, without-replacement question draws.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use tracing::{debug, warn};

use prep_core::model::{Domain, Question, QuestionId, SampledQuestion};

/// A top-level domain and the questions tagged with it or its subdomains.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainPool {
    pub domain: Domain,
    pub questions: Vec<Question>,
}

/// Questions owed to a domain: `round(total * weight)`, at least one.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn domain_quota(requested_total: u32, weight: f64) -> usize {
    let raw = (f64::from(requested_total) * weight).round();
    if raw.is_finite() && raw > 1.0 {
        raw as usize
    } else {
        1
    }
}

/// Draw a simulation from `pools`.
///
/// Each domain contributes `min(quota, available)` questions; a short pool is
/// logged and never backfilled from other domains. A question tagged under
/// two domains is drawn at most once. The result is shuffled.
pub fn sample_simulation<R: Rng + ?Sized>(
    pools: &[DomainPool],
    requested_total: u32,
    rng: &mut R,
) -> Vec<SampledQuestion> {
    if requested_total == 0 {
        return Vec::new();
    }

    let mut drawn: BTreeSet<QuestionId> = BTreeSet::new();
    let mut out = Vec::new();

    for pool in pools {
        let quota = domain_quota(requested_total, pool.domain.effective_weight(pools.len()));
        let candidates: Vec<&Question> = pool
            .questions
            .iter()
            .filter(|q| !drawn.contains(&q.id))
            .collect();
        let take = quota.min(candidates.len());

        if take < quota {
            warn!(
                domain_id = %pool.domain.id,
                domain_code = %pool.domain.code,
                quota,
                delivered = take,
                "domain pool short for simulation"
            );
        }

        for question in candidates.choose_multiple(rng, take) {
            drawn.insert(question.id);
            out.push(SampledQuestion::new((*question).clone(), &pool.domain));
        }
    }

    out.shuffle(rng);
    debug!(requested_total, delivered = out.len(), "simulation sampled");
    out
}

/// Draw up to `count` questions from a single domain's pool, shuffled.
pub fn sample_domain_quiz<R: Rng + ?Sized>(
    pool: &DomainPool,
    count: u32,
    rng: &mut R,
) -> Vec<SampledQuestion> {
    let take = usize::try_from(count)
        .unwrap_or(usize::MAX)
        .min(pool.questions.len());
    let mut out: Vec<SampledQuestion> = pool
        .questions
        .choose_multiple(rng, take)
        .map(|q| SampledQuestion::new(q.clone(), &pool.domain))
        .collect();
    out.shuffle(rng);
    out
}
