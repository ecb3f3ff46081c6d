use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rollcall_core::{
    AttendanceStatus, CaptureMethod, Descriptor, EnrollError, EnrollmentRequest, Identity, RecognitionOutcome,
    RecognitionRequest, RejectReason, RollNumber, Roster,
};

fn class_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 9, 0, 0).unwrap()
}

fn enroll(roster: &Roster, roll: &str, name: &str, descriptor: &[f64]) -> Result<Identity, EnrollError> {
    roster.enroll(
        EnrollmentRequest {
            roll_number: roll.into(),
            name: name.into(),
            email: None,
            descriptor: descriptor.to_vec(),
        },
        class_start(),
    )
}

fn roster_with_asha() -> Roster {
    let roster = Roster::default();
    enroll(&roster, "R1", "Asha", &[1.0, 0.0, 0.0]).unwrap();
    roster
}

fn capture(descriptor: &[f64], subject: &str, at: DateTime<Utc>) -> RecognitionRequest {
    RecognitionRequest::new(descriptor.to_vec(), at)
        .subject(subject)
        .session("cam-1")
}

fn random_descriptor(rng: &mut StdRng, len: usize) -> Vec<f64> {
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[test]
fn exact_probe_is_recognized_present() {
    let roster = roster_with_asha();
    let outcome = roster.recognize(capture(&[1.0, 0.0, 0.0], "Math", class_start()));

    match outcome {
        RecognitionOutcome::Recognized { identity, similarity, confidence, status, event } => {
            assert_eq!(identity.name, "Asha");
            assert_eq!(identity.total_attendance, 1);
            assert!((similarity - 1.0).abs() < 1e-9);
            assert_eq!(confidence, 95.0);
            assert_eq!(status, AttendanceStatus::Present);
            assert_eq!(event.method, CaptureMethod::FacialRecognition);
            assert_eq!(event.session_id, "cam-1");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(roster.list_events().len(), 1);
}

#[test]
fn orthogonal_probe_is_rejected() {
    let roster = roster_with_asha();
    let outcome = roster.recognize(capture(&[0.0, 1.0, 0.0], "Math", class_start()));
    assert!(matches!(
        outcome,
        RecognitionOutcome::Rejected { reason: RejectReason::NoMatch, .. }
    ));
    assert!(roster.list_events().is_empty());
}

#[test]
fn second_capture_same_day_is_already_marked() {
    let roster = roster_with_asha();
    let first = match roster.recognize(capture(&[1.0, 0.0, 0.0], "Math", class_start())) {
        RecognitionOutcome::Recognized { event, .. } => event,
        other => panic!("unexpected outcome: {other:?}"),
    };

    let later = class_start() + Duration::hours(3);
    match roster.recognize(capture(&[1.0, 0.0, 0.0], "Math", later)) {
        RecognitionOutcome::AlreadyMarked { identity, existing_event } => {
            assert_eq!(identity.roll_number.as_str(), "R1");
            assert_eq!(existing_event, first);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(roster.list_events().len(), 1);
    assert_eq!(roster.identity("R1").unwrap().total_attendance, 1);
}

#[test]
fn near_probe_is_capped_and_present() {
    let roster = roster_with_asha();
    match roster.recognize(capture(&[0.9, 0.1, 0.0], "Math", class_start())) {
        RecognitionOutcome::Recognized { similarity, confidence, status, .. } => {
            assert!((similarity - 0.99388).abs() < 1e-4);
            assert_eq!(confidence, 95.0);
            assert_eq!(status, AttendanceStatus::Present);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn duplicate_roll_number_keeps_first_identity() {
    let roster = Roster::default();
    let first = enroll(&roster, "R1", "Asha", &[1.0, 0.0, 0.0]).unwrap();
    let err = enroll(&roster, "R1", "Imposter", &[0.0, 1.0, 0.0]).unwrap_err();

    assert_eq!(err, EnrollError::DuplicateKey(RollNumber::parse("R1").unwrap()));
    assert_eq!(roster.list_identities(), vec![first]);
}

#[test]
fn roll_numbers_stay_unique_under_random_enrollment() {
    let mut rng = StdRng::seed_from_u64(7);
    let roster = Roster::default();

    for _ in 0..200 {
        let roll = format!("R{}", rng.gen_range(0..40));
        let before = roster.list_identities();
        let exists = before.iter().any(|i| i.roll_number.as_str() == roll);
        let result = enroll(&roster, &roll, "Student", &random_descriptor(&mut rng, 8));

        if exists {
            assert!(matches!(result, Err(EnrollError::DuplicateKey(_))));
            assert_eq!(roster.list_identities(), before);
        } else {
            assert!(result.is_ok());
        }
    }

    let identities = roster.list_identities();
    let mut rolls: Vec<_> = identities.iter().map(|i| i.roll_number.clone()).collect();
    rolls.sort();
    rolls.dedup();
    assert_eq!(rolls.len(), identities.len());
}

#[test]
fn similarity_stays_within_cosine_range() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..500 {
        let len = rng.gen_range(1..64);
        let a = Descriptor::new(random_descriptor(&mut rng, len));
        let b = Descriptor::new(random_descriptor(&mut rng, len));
        let sim = a.similarity(&b);
        assert!((-1.0..=1.0).contains(&sim), "similarity {sim} out of range");
        if a.values.iter().any(|v| *v != 0.0) {
            assert!((a.similarity(&a) - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn recognized_outcomes_clear_threshold_and_cap() {
    let mut rng = StdRng::seed_from_u64(23);
    let roster = Roster::default();
    for n in 0..25 {
        enroll(&roster, &format!("R{n}"), "Student", &random_descriptor(&mut rng, 6)).unwrap();
    }
    let threshold = roster.policy().similarity_threshold;

    for i in 0..300 {
        let at = class_start() + Duration::days(i);
        let outcome = roster.recognize(capture(&random_descriptor(&mut rng, 6), "Math", at));
        if let RecognitionOutcome::Recognized { similarity, confidence, .. } = outcome {
            assert!(similarity > threshold);
            assert!((0.0..=95.0).contains(&confidence));
        }
    }
}

#[test]
fn concurrent_captures_record_once_per_day() {
    let roster = Arc::new(roster_with_asha());
    enroll(&roster, "R2", "Ravi", &[0.0, 1.0, 0.0]).unwrap();

    let outcomes: Vec<RecognitionOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let roster = roster.clone();
                scope.spawn(move || {
                    let probe = if i % 2 == 0 { [1.0, 0.0, 0.0] } else { [0.0, 1.0, 0.0] };
                    let at = class_start() + Duration::minutes(i);
                    roster.recognize(capture(&probe, "Math", at))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let recognized = outcomes
        .iter()
        .filter(|o| matches!(o, RecognitionOutcome::Recognized { .. }))
        .count();
    let already = outcomes
        .iter()
        .filter(|o| matches!(o, RecognitionOutcome::AlreadyMarked { .. }))
        .count();

    assert_eq!(recognized, 2);
    assert_eq!(already, 14);
    assert_eq!(roster.list_events().len(), 2);
    for roll in ["R1", "R2"] {
        assert_eq!(roster.identity(roll).unwrap().total_attendance, 1);
    }
}

#[test]
fn purge_races_cleanly_with_recognition() {
    let roster = Arc::new(Roster::default());

    for round in 0..20 {
        enroll(&roster, "R1", "Asha", &[1.0, 0.0, 0.0]).unwrap();
        let at = class_start() + Duration::days(round);

        std::thread::scope(|scope| {
            let recognizer = {
                let roster = roster.clone();
                scope.spawn(move || roster.recognize(capture(&[1.0, 0.0, 0.0], "Math", at)))
            };
            let purger = {
                let roster = roster.clone();
                scope.spawn(move || roster.purge_all())
            };
            purger.join().unwrap();
            let outcome = recognizer.join().unwrap();
            assert!(matches!(
                outcome,
                RecognitionOutcome::Recognized { .. }
                    | RecognitionOutcome::Rejected { reason: RejectReason::NoMatch | RejectReason::NotFound, .. }
            ));
        });

        // Whatever interleaving won, nothing survives the purge half-cleared.
        assert!(roster.list_events().is_empty());
        assert!(roster.list_identities().is_empty());
    }
}

#[test]
fn summary_reflects_ledger() {
    let roster = roster_with_asha();
    enroll(&roster, "R2", "Ravi", &[0.0, 1.0, 0.0]).unwrap();

    roster.recognize(capture(&[1.0, 0.0, 0.0], "Math", class_start()));
    // Ravi at ~0.6 similarity: confidence ~60, late.
    roster.recognize(capture(&[0.0, 0.6, 0.8], "Math", class_start()));

    let summary = roster.summary(Some(class_start().date_naive()));
    assert_eq!(summary.total_identities, 2);
    assert_eq!(summary.total_events, 2);
    assert_eq!(summary.present_count, 1);
    assert_eq!(summary.late_count, 1);
    assert!((summary.attendance_rate - 50.0).abs() < 1e-9);
}
