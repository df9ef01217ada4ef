//! Tests for the reminder sweep.

mod support;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_engine::config::ReminderConfig;
use lesson_engine::notify::{Notifier, NotifyError, ReminderKind};
use lesson_engine::reminders::{ReminderReport, ReminderSweep};
use lesson_engine::store::AppointmentStore;
use lesson_engine::{Appointment, AppointmentStatus, MemoryStore};
use support::{utc, RecordingNotifier};
use uuid::Uuid;

async fn booked(store: &MemoryStore, start: DateTime<Utc>) -> Appointment {
    let a = Appointment::scheduled(
        Uuid::new_v4(),
        vec![Uuid::new_v4()],
        None,
        start,
        start + chrono::Duration::hours(1),
    )
    .unwrap();
    store.insert(&a).await.unwrap();
    a
}

fn sweep(store: Arc<MemoryStore>, notifier: Arc<RecordingNotifier>) -> ReminderSweep {
    ReminderSweep::new(store, notifier, ReminderConfig::default(), Duration::from_millis(200))
}

#[tokio::test]
async fn day_before_and_upcoming_reminders() {
    let store = Arc::new(MemoryStore::new());
    let now = utc(2026, 3, 3, 10, 0);
    let tomorrow = booked(&store, utc(2026, 3, 4, 9, 0)).await;
    let soon = booked(&store, utc(2026, 3, 3, 10, 30)).await;
    let next_week = booked(&store, utc(2026, 3, 10, 9, 0)).await;
    let notifier = Arc::new(RecordingNotifier::default());

    let report = sweep(store.clone(), notifier.clone()).run(now).await.unwrap();

    assert_eq!(
        report,
        ReminderReport {
            day_before_sent: 1,
            upcoming_sent: 1,
            failed: 0,
        }
    );
    let tomorrow = store.find_appointment(tomorrow.id).await.unwrap().unwrap();
    assert_eq!(tomorrow.day_before_reminder_sent_at, Some(now));
    assert!(!tomorrow.reminder_sent());
    // Already inside the short lead: only the short-lead reminder goes out
    let soon = store.find_appointment(soon.id).await.unwrap().unwrap();
    assert_eq!(soon.reminder_sent_at, Some(now));
    assert!(!soon.day_before_reminder_sent());
    assert_eq!(notifier.sent().len(), 2);
    let next_week = store.find_appointment(next_week.id).await.unwrap().unwrap();
    assert!(!next_week.day_before_reminder_sent());
}

#[tokio::test]
async fn reminders_are_sent_once() {
    let store = Arc::new(MemoryStore::new());
    booked(&store, utc(2026, 3, 4, 9, 0)).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let sweep = sweep(store.clone(), notifier.clone());

    sweep.run(utc(2026, 3, 3, 10, 0)).await.unwrap();
    let again = sweep.run(utc(2026, 3, 3, 11, 0)).await.unwrap();

    assert_eq!(again, ReminderReport::default());
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn failed_reminder_is_retried_next_sweep() {
    let store = Arc::new(MemoryStore::new());
    let a = booked(&store, utc(2026, 3, 4, 9, 0)).await;

    let report = sweep(store.clone(), Arc::new(RecordingNotifier::failing()))
        .run(utc(2026, 3, 3, 10, 0))
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert!(!store.find_appointment(a.id).await.unwrap().unwrap().day_before_reminder_sent());

    let report = sweep(store.clone(), Arc::new(RecordingNotifier::default()))
        .run(utc(2026, 3, 3, 11, 0))
        .await
        .unwrap();
    assert_eq!(report.day_before_sent, 1);
}

#[tokio::test]
async fn cancelled_appointments_get_no_reminder() {
    let store = Arc::new(MemoryStore::new());
    let mut a = booked(&store, utc(2026, 3, 4, 9, 0)).await;
    a.status = AppointmentStatus::Cancelled;
    store.save(&a).await.unwrap();
    let notifier = Arc::new(RecordingNotifier::default());

    let report = sweep(store, notifier.clone()).run(utc(2026, 3, 3, 10, 0)).await.unwrap();

    assert_eq!(report, ReminderReport::default());
    assert!(notifier.sent().is_empty());
}

/// Cancels the appointment in the store while its reminder is being sent.
struct CancelsMidSend {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl Notifier for CancelsMidSend {
    async fn send_confirmation(&self, _appointment: &Appointment) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_cancellation(&self, _appointment: &Appointment) -> Result<(), NotifyError> {
        Ok(())
    }

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        _kind: ReminderKind,
    ) -> Result<(), NotifyError> {
        let mut current = self.store.find_appointment(appointment.id).await.unwrap().unwrap();
        current.status = AppointmentStatus::Cancelled;
        self.store.save(&current).await.unwrap();
        Ok(())
    }
}

#[tokio::test]
async fn cancellation_during_the_sweep_stands() {
    let store = Arc::new(MemoryStore::new());
    let a = booked(&store, utc(2026, 3, 4, 9, 0)).await;
    let notifier = Arc::new(CancelsMidSend {
        store: store.clone(),
    });
    let sweep = ReminderSweep::new(
        store.clone(),
        notifier,
        ReminderConfig::default(),
        Duration::from_millis(200),
    );

    let report = sweep.run(utc(2026, 3, 3, 10, 0)).await.unwrap();

    assert_eq!(report.day_before_sent, 0);
    let stored = store.find_appointment(a.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Cancelled);
    assert!(!stored.day_before_reminder_sent());
}
