//! Tests for appointment conflict detection.

mod support;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lesson_engine::store::AppointmentStore;
use lesson_engine::{find_conflicts, Appointment, AppointmentStatus, ConflictDetector, MemoryStore};
use support::utc;
use uuid::Uuid;

fn appointment(
    tutor: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: AppointmentStatus,
) -> Appointment {
    let mut a = Appointment::scheduled(tutor, vec![Uuid::new_v4()], None, start, end).unwrap();
    a.status = status;
    a
}

#[test]
fn overlapping_scheduled_appointment_is_a_conflict() {
    let tutor = Uuid::new_v4();
    let existing = vec![appointment(
        tutor,
        utc(2026, 3, 4, 9, 0),
        utc(2026, 3, 4, 10, 0),
        AppointmentStatus::Scheduled,
    )];

    let conflicts = find_conflicts(
        &existing,
        utc(2026, 3, 4, 9, 30),
        utc(2026, 3, 4, 10, 30),
        None,
    );

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].overlap_minutes, 30);
    assert_eq!(conflicts[0].appointment.id, existing[0].id);
}

#[test]
fn adjacent_appointment_is_not_a_conflict() {
    let tutor = Uuid::new_v4();
    let existing = vec![appointment(
        tutor,
        utc(2026, 3, 4, 9, 0),
        utc(2026, 3, 4, 10, 0),
        AppointmentStatus::Scheduled,
    )];

    let next = (utc(2026, 3, 4, 10, 0), utc(2026, 3, 4, 11, 0));
    assert!(find_conflicts(&existing, next.0, next.1, None).is_empty());
}

#[test]
fn finished_or_cancelled_appointments_never_block() {
    let tutor = Uuid::new_v4();
    let (start, end) = (utc(2026, 3, 4, 9, 0), utc(2026, 3, 4, 10, 0));

    for status in [
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ] {
        let existing = vec![appointment(tutor, start, end, status)];
        assert!(
            find_conflicts(&existing, start, end, None).is_empty(),
            "{status:?} should not block a booking"
        );
    }
}

#[test]
fn excluded_appointment_does_not_conflict_with_itself() {
    let tutor = Uuid::new_v4();
    let existing = vec![appointment(
        tutor,
        utc(2026, 3, 4, 9, 0),
        utc(2026, 3, 4, 10, 0),
        AppointmentStatus::Scheduled,
    )];

    let moved = find_conflicts(
        &existing,
        utc(2026, 3, 4, 9, 30),
        utc(2026, 3, 4, 10, 30),
        Some(existing[0].id),
    );
    assert!(moved.is_empty());
}

#[tokio::test]
async fn detector_only_considers_the_given_tutor() {
    let store = Arc::new(MemoryStore::new());
    let tutor = Uuid::new_v4();
    let other = Uuid::new_v4();
    let (start, end) = (utc(2026, 3, 4, 9, 0), utc(2026, 3, 4, 10, 0));
    store
        .insert(&appointment(other, start, end, AppointmentStatus::Scheduled))
        .await
        .unwrap();

    let detector = ConflictDetector::new(store.clone());
    assert!(!detector.has_conflict(tutor, start, end, None).await.unwrap());
    assert!(detector.has_conflict(other, start, end, None).await.unwrap());
}

#[tokio::test]
async fn detector_ignores_cancelled_appointments_in_the_store() {
    let store = Arc::new(MemoryStore::new());
    let tutor = Uuid::new_v4();
    let (start, end) = (utc(2026, 3, 4, 9, 0), utc(2026, 3, 4, 10, 0));
    store
        .insert(&appointment(tutor, start, end, AppointmentStatus::Cancelled))
        .await
        .unwrap();

    let detector = ConflictDetector::new(store.clone());
    assert!(!detector.has_conflict(tutor, start, end, None).await.unwrap());
}
