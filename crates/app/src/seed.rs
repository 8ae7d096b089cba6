//! Demo catalog for a fresh database.

use anyhow::Result;
use chrono::Duration;
use tracing::info;

use prep_core::Clock;
use prep_core::model::{
    Certification, CertificationId, Domain, DomainId, Enrollment, MatchPair, PassingScore,
    Question, QuestionId, QuestionKind, UserId,
};
use storage::Storage;
use storage::repository::{CatalogRepository, EnrollmentRepository};

pub const DEMO_CERTIFICATION: u64 = 1;

/// Upsert the demo certification, its blueprint and question bank, and
/// enroll `user` with a target date 60 days out.
pub async fn seed_demo(storage: &Storage, clock: Clock, user: UserId) -> Result<()> {
    let cert = Certification::new(
        CertificationId::new(DEMO_CERTIFICATION),
        "SEC-101",
        "Security Fundamentals",
        PassingScore::Scaled {
            passing: 750,
            max: 900,
        },
    )?;
    storage.catalog.upsert_certification(&cert).await?;

    let threats = Domain::new(DomainId::new(1), cert.id, "1.0", "Threats and Attacks", Some(0.35))?;
    let architecture = Domain::new(DomainId::new(2), cert.id, "2.0", "Architecture", Some(0.25))?;
    let operations = Domain::new(DomainId::new(3), cert.id, "3.0", "Operations", Some(0.4))?;
    let crypto = Domain::new(DomainId::new(4), cert.id, "2.1", "Cryptography", None)?
        .with_parent(architecture.id);
    for domain in [&threats, &architecture, &operations, &crypto] {
        storage.catalog.upsert_domain(domain).await?;
    }

    let mut questions = Vec::new();
    let mut next_id = 1_u64;
    let mut push = |text: &str, kind: QuestionKind, domain: DomainId| {
        questions.push(Question::new(QuestionId::new(next_id), text, kind).with_domains([domain]));
        next_id += 1;
    };

    for (text, answer) in [
        ("Phishing relies on social engineering", true),
        ("A worm needs a host program to spread", false),
        ("Tailgating is a physical attack", true),
        ("SQL injection targets the network layer", false),
    ] {
        push(
            text,
            QuestionKind::TrueFalse {
                correct: vec![if answer { 0 } else { 1 }],
            },
            threats.id,
        );
    }
    push(
        "Which attack floods a target from many hosts?",
        QuestionKind::Choice {
            options: vec!["DDoS".into(), "Vishing".into(), "Pretexting".into()],
            correct: vec![0],
        },
        threats.id,
    );
    push(
        "Order the phases of the kill chain",
        QuestionKind::Ordering {
            items: vec![
                "Reconnaissance".into(),
                "Weaponization".into(),
                "Delivery".into(),
                "Exploitation".into(),
            ],
        },
        threats.id,
    );
    push(
        "Which are symmetric ciphers?",
        QuestionKind::Choice {
            options: vec!["AES".into(), "RSA".into(), "ChaCha20".into(), "ECDSA".into()],
            correct: vec![0, 2],
        },
        crypto.id,
    );
    push(
        "Hashing is reversible",
        QuestionKind::TrueFalse { correct: vec![1] },
        crypto.id,
    );
    push(
        "Match each control to its type",
        QuestionKind::Matching {
            pairs: vec![
                MatchPair::new("Firewall", "Technical"),
                MatchPair::new("Policy", "Administrative"),
                MatchPair::new("Fence", "Physical"),
            ],
        },
        architecture.id,
    );
    push(
        "Which segment hosts public-facing servers?",
        QuestionKind::Choice {
            options: vec!["DMZ".into(), "VLAN 1".into(), "Intranet".into()],
            correct: vec![0],
        },
        architecture.id,
    );
    for (text, answer) in [
        ("Incident response starts with preparation", true),
        ("Log retention has no compliance impact", false),
        ("A SIEM correlates events from many sources", true),
    ] {
        push(
            text,
            QuestionKind::TrueFalse {
                correct: vec![if answer { 0 } else { 1 }],
            },
            operations.id,
        );
    }
    push(
        "Order the incident response steps",
        QuestionKind::Ordering {
            items: vec![
                "Identification".into(),
                "Containment".into(),
                "Eradication".into(),
                "Recovery".into(),
            ],
        },
        operations.id,
    );

    for question in &questions {
        storage.catalog.upsert_question(question).await?;
    }

    let target = (clock.now() + Duration::days(60)).date_naive();
    storage
        .enrollments
        .upsert_enrollment(&Enrollment::new(user, cert.id, clock.now()).with_target_date(target))
        .await?;

    info!(
        certification = %cert.code,
        questions = questions.len(),
        user_id = %user,
        "demo catalog seeded"
    );
    Ok(())
}
