use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prep_core::model::{
    AnswerOutcome, CardId, Certification, CertificationId, Domain, DomainId, Enrollment,
    PerformanceRecord, PerformanceTotals, Question, QuestionId, ReviewLog, SimulationId,
    SimulationResult, SimulationRow, SrsCard, UserId,
};

use crate::repository::{
    AttemptRecord, AttemptRepository, CatalogRepository, EnrollmentRepository,
    PerformanceRepository, ReviewPersistence, SimulationRepository, SrsCardRepository,
    StorageError,
};

type Key = (UserId, QuestionId);
type Slot<T> = Arc<Mutex<T>>;

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

fn fold(slot: &mut Option<PerformanceRecord>, outcome: &AnswerOutcome) -> PerformanceRecord {
    let record = match slot.take() {
        Some(mut record) => {
            record.record(outcome);
            record
        }
        None => PerformanceRecord::first(outcome),
    };
    *slot = Some(record.clone());
    record
}

#[derive(Default)]
struct State {
    certifications: Mutex<HashMap<CertificationId, Certification>>,
    domains: Mutex<BTreeMap<DomainId, Domain>>,
    questions: Mutex<BTreeMap<QuestionId, Question>>,
    enrollments: Mutex<HashMap<(UserId, CertificationId), Enrollment>>,
    // Outer maps are held only long enough to fetch a slot; writers to a
    // (user, question) key serialize on the slot's own lock.
    performance: Mutex<HashMap<Key, Slot<Option<PerformanceRecord>>>>,
    cards: Mutex<BTreeMap<CardId, Slot<SrsCard>>>,
    card_keys: Mutex<HashMap<Key, CardId>>,
    review_logs: Mutex<Vec<ReviewLog>>,
    simulations: Mutex<Vec<SimulationRow>>,
    attempts: Mutex<Vec<(i64, AttemptRecord)>>,
    next_card_id: AtomicU64,
    next_simulation_id: AtomicU64,
    next_attempt_id: AtomicU64,
}

/// In-memory repository for tests and prototyping.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<State>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn performance_slot(&self, key: Key) -> Result<Slot<Option<PerformanceRecord>>, StorageError> {
        let mut map = lock(&self.state.performance)?;
        Ok(Arc::clone(map.entry(key).or_default()))
    }

    fn card_slot(&self, id: CardId) -> Result<Slot<SrsCard>, StorageError> {
        let map = lock(&self.state.cards)?;
        map.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    fn user_card_slots(&self, user: UserId) -> Result<Vec<Slot<SrsCard>>, StorageError> {
        let keys = lock(&self.state.card_keys)?;
        let ids: Vec<CardId> = keys
            .iter()
            .filter(|((u, _), _)| *u == user)
            .map(|(_, id)| *id)
            .collect();
        drop(keys);

        let map = lock(&self.state.cards)?;
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    fn due_cards(&self, user: UserId, now: DateTime<Utc>) -> Result<Vec<SrsCard>, StorageError> {
        let mut due = Vec::new();
        for slot in self.user_card_slots(user)? {
            let card = lock(&slot)?;
            if card.is_due(now) {
                due.push(card.clone());
            }
        }
        due.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then(a.id.cmp(&b.id))
        });
        Ok(due)
    }

    /// Lock every key touched by `outcomes` in key order, run `commit`, then
    /// fold the outcomes in. Nothing is folded if `commit` fails.
    fn with_outcomes_locked<R>(
        &self,
        outcomes: &[AnswerOutcome],
        commit: impl FnOnce() -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let slots: BTreeMap<Key, Slot<Option<PerformanceRecord>>> = {
            let mut map = lock(&self.state.performance)?;
            outcomes
                .iter()
                .map(|o| {
                    let key = (o.user_id, o.question_id);
                    (key, Arc::clone(map.entry(key).or_default()))
                })
                .collect()
        };

        let mut guards = BTreeMap::new();
        for (key, slot) in &slots {
            guards.insert(*key, lock(slot)?);
        }

        let out = commit()?;
        for outcome in outcomes {
            if let Some(guard) = guards.get_mut(&(outcome.user_id, outcome.question_id)) {
                fold(guard, outcome);
            }
        }
        Ok(out)
    }

    fn tagged_questions(&self, domains: &[DomainId]) -> Result<BTreeSet<QuestionId>, StorageError> {
        let questions = lock(&self.state.questions)?;
        Ok(questions
            .values()
            .filter(|q| domains.iter().any(|d| q.is_tagged(*d)))
            .map(|q| q.id)
            .collect())
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_certification(&self, cert: &Certification) -> Result<(), StorageError> {
        lock(&self.state.certifications)?.insert(cert.id, cert.clone());
        Ok(())
    }

    async fn get_certification(&self, id: CertificationId) -> Result<Certification, StorageError> {
        lock(&self.state.certifications)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn upsert_domain(&self, domain: &Domain) -> Result<(), StorageError> {
        if !lock(&self.state.certifications)?.contains_key(&domain.certification_id) {
            return Err(StorageError::NotFound);
        }
        lock(&self.state.domains)?.insert(domain.id, domain.clone());
        Ok(())
    }

    async fn get_domains(&self, cert: CertificationId) -> Result<Vec<Domain>, StorageError> {
        let guard = lock(&self.state.domains)?;
        let mut domains: Vec<Domain> = guard
            .values()
            .filter(|d| d.certification_id == cert)
            .cloned()
            .collect();
        domains.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
        Ok(domains)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        {
            let domains = lock(&self.state.domains)?;
            if question.domain_ids.iter().any(|d| !domains.contains_key(d)) {
                return Err(StorageError::NotFound);
            }
        }
        lock(&self.state.questions)?.insert(question.id, question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Question, StorageError> {
        lock(&self.state.questions)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_question_bank(&self, domain: DomainId) -> Result<Vec<Question>, StorageError> {
        let guard = lock(&self.state.questions)?;
        Ok(guard.values().filter(|q| q.is_tagged(domain)).cloned().collect())
    }

    async fn count_questions(&self, domains: &[DomainId]) -> Result<u32, StorageError> {
        let count = self.tagged_questions(domains)?.len();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn upsert_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        lock(&self.state.enrollments)?.insert(
            (enrollment.user_id, enrollment.certification_id),
            enrollment.clone(),
        );
        Ok(())
    }

    async fn latest_enrollment(&self, user: UserId) -> Result<Option<Enrollment>, StorageError> {
        let guard = lock(&self.state.enrollments)?;
        Ok(guard
            .values()
            .filter(|e| e.user_id == user)
            .max_by(|a, b| {
                a.enrolled_at
                    .cmp(&b.enrolled_at)
                    .then(a.certification_id.cmp(&b.certification_id))
            })
            .cloned())
    }
}

//
// ─── PERFORMANCE ───────────────────────────────────────────────────────────────
//

#[async_trait]
impl PerformanceRepository for InMemoryRepository {
    async fn get_performance(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<PerformanceRecord>, StorageError> {
        let slot = {
            let map = lock(&self.state.performance)?;
            map.get(&(user, question)).cloned()
        };
        match slot {
            Some(slot) => Ok(lock(&slot)?.clone()),
            None => Ok(None),
        }
    }

    async fn upsert_performance(
        &self,
        outcome: &AnswerOutcome,
    ) -> Result<PerformanceRecord, StorageError> {
        let slot = self.performance_slot((outcome.user_id, outcome.question_id))?;
        let mut guard = lock(&slot)?;
        Ok(fold(&mut guard, outcome))
    }

    async fn totals_for_domains(
        &self,
        user: UserId,
        domains: &[DomainId],
    ) -> Result<PerformanceTotals, StorageError> {
        let questions = self.tagged_questions(domains)?;
        let slots: Vec<Slot<Option<PerformanceRecord>>> = {
            let map = lock(&self.state.performance)?;
            questions
                .iter()
                .filter_map(|q| map.get(&(user, *q)).cloned())
                .collect()
        };

        let mut totals = PerformanceTotals::default();
        for slot in slots {
            if let Some(record) = lock(&slot)?.as_ref() {
                totals.add(PerformanceTotals::new(record.times_seen, record.times_correct));
            }
        }
        Ok(totals)
    }

    async fn user_totals(&self, user: UserId) -> Result<PerformanceTotals, StorageError> {
        let slots: Vec<Slot<Option<PerformanceRecord>>> = {
            let map = lock(&self.state.performance)?;
            map.iter()
                .filter(|((u, _), _)| *u == user)
                .map(|(_, slot)| Arc::clone(slot))
                .collect()
        };

        let mut totals = PerformanceTotals::default();
        for slot in slots {
            if let Some(record) = lock(&slot)?.as_ref() {
                totals.add(PerformanceTotals::new(record.times_seen, record.times_correct));
            }
        }
        Ok(totals)
    }
}

//
// ─── SRS CARDS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
impl SrsCardRepository for InMemoryRepository {
    async fn get_card(&self, id: CardId) -> Result<SrsCard, StorageError> {
        let slot = self.card_slot(id)?;
        let card = lock(&slot)?.clone();
        Ok(card)
    }

    async fn find_card(
        &self,
        user: UserId,
        question: QuestionId,
    ) -> Result<Option<SrsCard>, StorageError> {
        let id = lock(&self.state.card_keys)?.get(&(user, question)).copied();
        match id {
            Some(id) => {
                let slot = self.card_slot(id)?;
                let card = lock(&slot)?.clone();
                Ok(Some(card))
            }
            None => Ok(None),
        }
    }

    async fn insert_card_if_absent(
        &self,
        user: UserId,
        question: QuestionId,
        now: DateTime<Utc>,
    ) -> Result<SrsCard, StorageError> {
        let mut keys = lock(&self.state.card_keys)?;
        if let Some(id) = keys.get(&(user, question)).copied() {
            drop(keys);
            let slot = self.card_slot(id)?;
            let card = lock(&slot)?.clone();
            return Ok(card);
        }

        let id = CardId::new(self.state.next_card_id.fetch_add(1, Ordering::Relaxed) + 1);
        let card = SrsCard::new(id, user, question, now);
        lock(&self.state.cards)?.insert(id, Arc::new(Mutex::new(card.clone())));
        keys.insert((user, question), id);
        Ok(card)
    }

    async fn get_srs_cards_due(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<SrsCard>, StorageError> {
        let mut due = self.due_cards(user, now)?;
        due.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(due)
    }

    async fn count_due(&self, user: UserId, now: DateTime<Utc>) -> Result<u32, StorageError> {
        let due = self.due_cards(user, now)?;
        Ok(u32::try_from(due.len()).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl ReviewPersistence for InMemoryRepository {
    async fn apply_review(
        &self,
        expected_revision: u32,
        card: &SrsCard,
        log: &ReviewLog,
        outcome: &AnswerOutcome,
    ) -> Result<(), StorageError> {
        if log.card_id != card.id
            || outcome.user_id != card.user_id
            || outcome.question_id != card.question_id
        {
            return Err(StorageError::Conflict);
        }

        let card_slot = self.card_slot(card.id)?;
        let mut stored = lock(&card_slot)?;
        if stored.revision != expected_revision {
            return Err(StorageError::Conflict);
        }

        let perf_slot = self.performance_slot((outcome.user_id, outcome.question_id))?;
        let mut perf = lock(&perf_slot)?;
        let mut logs = lock(&self.state.review_logs)?;

        *stored = card.clone();
        fold(&mut perf, outcome);
        logs.push(log.clone());
        Ok(())
    }
}

//
// ─── SIMULATIONS & ATTEMPTS ────────────────────────────────────────────────────
//

#[async_trait]
impl SimulationRepository for InMemoryRepository {
    async fn get_simulation_history(
        &self,
        user: UserId,
        cert: CertificationId,
        limit: u32,
    ) -> Result<Vec<SimulationRow>, StorageError> {
        let guard = lock(&self.state.simulations)?;
        let mut rows: Vec<SimulationRow> = guard
            .iter()
            .filter(|r| r.result.user_id == user && r.result.certification_id == cert)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .completed_at
                .cmp(&a.result.completed_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn record_simulation(
        &self,
        result: &SimulationResult,
        outcomes: &[AnswerOutcome],
    ) -> Result<SimulationId, StorageError> {
        self.with_outcomes_locked(outcomes, || {
            let mut rows = lock(&self.state.simulations)?;
            let id = SimulationId::new(
                self.state.next_simulation_id.fetch_add(1, Ordering::Relaxed) + 1,
            );
            rows.push(SimulationRow::new(id, result.clone()));
            Ok(id)
        })
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn record_attempt(
        &self,
        attempt: &AttemptRecord,
        outcomes: &[AnswerOutcome],
    ) -> Result<i64, StorageError> {
        self.with_outcomes_locked(outcomes, || {
            let mut rows = lock(&self.state.attempts)?;
            let next = self.state.next_attempt_id.fetch_add(1, Ordering::Relaxed) + 1;
            let id = i64::try_from(next)
                .map_err(|_| StorageError::Serialization("attempt id overflow".into()))?;
            rows.push((id, attempt.clone()));
            Ok(id)
        })
    }

    async fn study_seconds_since(
        &self,
        user: UserId,
        since: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let attempts: u64 = lock(&self.state.attempts)?
            .iter()
            .filter(|(_, a)| a.user_id == user && a.recorded_at >= since)
            .map(|(_, a)| u64::from(a.time_spent_secs))
            .sum();
        let simulations: u64 = lock(&self.state.simulations)?
            .iter()
            .filter(|r| r.result.user_id == user && r.result.completed_at >= since)
            .filter_map(|r| r.result.duration_secs.map(u64::from))
            .sum();
        Ok(attempts + simulations)
    }
}
