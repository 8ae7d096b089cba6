use std::collections::BTreeMap;

use chrono::Duration;
use prep_core::model::{
    Answer, CardStatus, Certification, CertificationId, ChoiceAnswer, Domain, DomainId,
    Enrollment, PassingScore, Question, QuestionId, QuestionKind, SessionBlockKind, UserId,
};
use prep_core::readiness::{Confidence, DomainStatus};
use prep_core::time::fixed_now;
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::{
    AttemptBatch, Clock, EngineConfig, ReviewServiceError, SimulationSubmission, StudyEngine,
    SubmittedAnswer,
};
use storage::Storage;
use storage::repository::{CatalogRepository, EnrollmentRepository};

const CERT: u64 = 1;

async fn seed(storage: &Storage) {
    let cert = Certification::new(
        CertificationId::new(CERT),
        "CLD",
        "Cloud Practitioner",
        PassingScore::Percentage { pct: 70.0 },
    )
    .unwrap();
    storage.catalog.upsert_certification(&cert).await.unwrap();

    let domains = [
        Domain::new(DomainId::new(1), cert.id, "1.0", "Concepts", Some(0.6)).unwrap(),
        Domain::new(DomainId::new(2), cert.id, "2.0", "Security", Some(0.4)).unwrap(),
    ];
    for d in &domains {
        storage.catalog.upsert_domain(d).await.unwrap();
    }

    // Option 0 is always the right answer.
    for id in 1..=30 {
        let domain = if id <= 18 { 1 } else { 2 };
        let q = Question::new(
            QuestionId::new(id),
            format!("Question {id}"),
            QuestionKind::Choice {
                options: vec!["right".into(), "wrong".into()],
                correct: vec![0],
            },
        )
        .with_domains([DomainId::new(domain)]);
        storage.catalog.upsert_question(&q).await.unwrap();
    }
}

fn answer(option: u32) -> Option<Answer> {
    Some(Answer::Choice(ChoiceAnswer::Single(option)))
}

#[tokio::test]
async fn practice_review_simulate_and_plan() {
    let storage = Storage::in_memory();
    seed(&storage).await;
    let user = UserId::new(42);
    let cert = CertificationId::new(CERT);
    storage
        .enrollments
        .upsert_enrollment(&Enrollment::new(user, cert, fixed_now()))
        .await
        .unwrap();

    let engine = StudyEngine::new(&storage, Clock::fixed(fixed_now()), EngineConfig::default());

    // Before any study: everything unseen, no prediction, first simulation suggested.
    let readiness = engine.compute_readiness(user, cert).await.unwrap();
    assert!(readiness.prediction.is_none());
    assert!(
        readiness
            .domains
            .iter()
            .all(|d| d.status == DomainStatus::Unseen)
    );

    // Practice: domain 1 all right, domain 2 mostly wrong, one skipped.
    let mut answers: Vec<SubmittedAnswer> = (1..=12)
        .map(|id| SubmittedAnswer::new(QuestionId::new(id), answer(0)).with_response_time(4_000))
        .collect();
    answers.extend((19..=28).map(|id| SubmittedAnswer::new(QuestionId::new(id), answer(1))));
    answers.push(SubmittedAnswer::new(QuestionId::new(29), None));
    let summary = engine
        .record_attempt(&AttemptBatch {
            user_id: user,
            certification_id: Some(cert),
            answers,
            time_spent_secs: Some(1_800),
        })
        .await
        .unwrap();
    assert_eq!(summary.answered, 22);
    assert_eq!(summary.correct, 12);
    assert_eq!(summary.enrolled_cards.len(), 10);

    let plan = engine.build_session_plan(user).await.unwrap();
    let kinds: Vec<&SessionBlockKind> = plan.blocks.iter().map(|b| &b.kind).collect();
    assert!(matches!(
        kinds[0],
        SessionBlockKind::SrsReview { due_count: 10 }
    ));
    assert!(matches!(
        kinds[1],
        SessionBlockKind::DomainQuiz { domain_id, question_count: 12, .. }
            if *domain_id == DomainId::new(2)
    ));
    assert!(matches!(
        kinds.last(),
        Some(SessionBlockKind::SimulationPrompt {
            first_attempt: true,
            ..
        })
    ));
    assert_eq!(plan.context.recent_study_hours, 0.5);

    // Review the missed cards.
    let due = engine.due_cards(user, None).await.unwrap();
    assert_eq!(due.len(), 10);
    for card in &due {
        let reviewed = engine.submit_srs_review(user, card.id, 5).await.unwrap();
        assert_eq!(reviewed.card.status, CardStatus::Review);
        assert_eq!(reviewed.card.interval_days, 1);
    }
    assert!(engine.due_cards(user, Some(5)).await.unwrap().is_empty());

    let stranger = engine
        .submit_srs_review(UserId::new(7), due[0].id, 5)
        .await
        .unwrap_err();
    assert!(matches!(stranger, ReviewServiceError::NotOwner { .. }));

    // Three simulations, answering everything correctly except one domain-2 question.
    for day in 0..3 {
        let sim_engine = StudyEngine::new(
            &storage,
            Clock::fixed(fixed_now() + Duration::days(day)),
            EngineConfig::default(),
        );
        let mut rng = StdRng::seed_from_u64(u64::try_from(day).unwrap());
        let questions = sim_engine
            .build_simulation(cert, Some(10), &mut rng)
            .await
            .unwrap();
        assert_eq!(questions.len(), 10);
        assert_eq!(
            questions
                .iter()
                .filter(|q| q.domain_id == DomainId::new(1))
                .count(),
            6
        );

        let mut missed_one = false;
        let answers: BTreeMap<QuestionId, Answer> = questions
            .iter()
            .map(|q| {
                let pick = if q.domain_id == DomainId::new(2) && !missed_one {
                    missed_one = true;
                    1
                } else {
                    0
                };
                (q.question.id, Answer::Choice(ChoiceAnswer::Single(pick)))
            })
            .collect();
        let row = sim_engine
            .record_simulation(&SimulationSubmission {
                user_id: user,
                certification_id: cert,
                questions,
                answers,
                duration_secs: Some(900),
            })
            .await
            .unwrap();
        assert_eq!(row.result.score, 9);
        assert!(row.result.passed);
    }

    let readiness = engine.compute_readiness(user, cert).await.unwrap();
    let prediction = readiness.prediction.unwrap();
    assert_eq!(prediction.simulations_considered, 3);
    assert!((prediction.average_simulation_pct - 90.0).abs() < 1e-9);
    // Both domains have at least ten samples by now.
    assert!((readiness.domain_coverage - 1.0).abs() < 1e-9);
    assert!(prediction.likely_pass);
    assert_eq!(prediction.confidence, Confidence::High);
}

#[tokio::test]
async fn domain_quiz_defaults_to_configured_size() {
    let storage = Storage::in_memory();
    seed(&storage).await;
    let engine = StudyEngine::new(&storage, Clock::fixed(fixed_now()), EngineConfig::default());
    let mut rng = StdRng::seed_from_u64(3);

    let quiz = engine
        .build_domain_quiz(CertificationId::new(CERT), DomainId::new(1), None, &mut rng)
        .await
        .unwrap();
    assert_eq!(quiz.len(), 15);
    assert!(quiz.iter().all(|q| q.domain_id == DomainId::new(1)));

    let question = storage
        .catalog
        .get_question(quiz[0].question.id)
        .await
        .unwrap();
    assert!(StudyEngine::evaluate_answer(&question, answer(0).as_ref()));
    assert!(!StudyEngine::evaluate_answer(&question, None));
}
