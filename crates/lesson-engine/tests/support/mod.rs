//! Shared fixtures and collaborator fakes for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lesson_engine::calendar::{CalendarEvent, CalendarSync, DisabledCalendar, EventUpdate};
use lesson_engine::notify::{Notifier, NotifyError, ReminderKind};
use lesson_engine::store::{AppointmentStore, StoreError};
use lesson_engine::{
    Appointment, AppointmentManager, Availability, Course, EngineConfig, MemoryStore,
    NewAppointment, Role, ScheduleSlot, Stores, User,
};
use uuid::Uuid;

pub const WEDNESDAY: u8 = 3;

pub fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn user(role: Role, name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        role,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

/// A store holding one tutor (Wednesdays 09:00-12:00) and one student.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub tutor: User,
    pub student: User,
}

pub async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let tutor = user(Role::Tutor, "Tina");
    let student = user(Role::Student, "Sam");
    store.put_user(tutor.clone()).await;
    store.put_user(student.clone()).await;
    store
        .put_availability(Availability::recurring(tutor.id, WEDNESDAY, "09:00", "12:00").unwrap())
        .await;
    Fixture {
        store,
        tutor,
        student,
    }
}

impl Fixture {
    pub fn booking(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            student_ids: vec![self.student.id],
            tutor_id: self.tutor.id,
            start,
            end,
            course_id: None,
            notes: None,
        }
    }

    /// Active course taught by the fixture tutor to the fixture student.
    pub async fn course(
        &self,
        start_date: NaiveDate,
        hours_balance: f64,
        slots: Vec<ScheduleSlot>,
    ) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            active: true,
            start_date,
            hours_balance,
            needs_renewal: false,
            tutor_id: self.tutor.id,
            student_ids: BTreeSet::from([self.student.id]),
            schedule: slots,
        };
        self.store.put_course(course.clone()).await;
        course
    }

    pub fn manager(&self) -> AppointmentManager {
        self.manager_with(Arc::new(DisabledCalendar), Arc::new(RecordingNotifier::default()))
    }

    pub fn manager_with(
        &self,
        calendar: Arc<dyn CalendarSync>,
        notifier: Arc<dyn Notifier>,
    ) -> AppointmentManager {
        manager_on(Stores::shared(self.store.clone()), calendar, notifier)
    }

    /// The fixture store for every role except appointments.
    pub fn stores_with(&self, appointments: Arc<dyn AppointmentStore>) -> Stores {
        Stores {
            appointments,
            ..Stores::shared(self.store.clone())
        }
    }
}

pub fn manager_on(
    stores: Stores,
    calendar: Arc<dyn CalendarSync>,
    notifier: Arc<dyn Notifier>,
) -> AppointmentManager {
    let config = EngineConfig {
        external_timeout_ms: 200,
        ..EngineConfig::default()
    };
    AppointmentManager::new(stores, calendar, notifier, chrono_tz::UTC, &config)
}

/// Appointment store that stalls chosen writes, so a background write can be
/// interleaved with a foreground one.
pub struct SlowAppointments {
    pub inner: Arc<MemoryStore>,
    pub batch_delay: Duration,
    pub confirmation_delay: Duration,
}

impl SlowAppointments {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            batch_delay: Duration::ZERO,
            confirmation_delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl AppointmentStore for SlowAppointments {
    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.inner.find_appointment(id).await
    }

    async fn tutor_appointments_between(
        &self,
        tutor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.tutor_appointments_between(tutor_id, from, to).await
    }

    async fn appointments_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.inner.appointments_starting_between(from, to).await
    }

    async fn exists_for_course_at(
        &self,
        course_id: Uuid,
        start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.exists_for_course_at(course_id, start).await
    }

    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        self.inner.insert(appointment).await
    }

    async fn insert_batch(&self, appointments: &[Appointment]) -> Result<(), StoreError> {
        tokio::time::sleep(self.batch_delay).await;
        self.inner.insert_batch(appointments).await
    }

    async fn save(&self, appointment: &Appointment) -> Result<(), StoreError> {
        self.inner.save(appointment).await
    }

    async fn mark_confirmation_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        tokio::time::sleep(self.confirmation_delay).await;
        self.inner.mark_confirmation_sent(id, at).await
    }

    async fn mark_reminder_sent(
        &self,
        id: Uuid,
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.mark_reminder_sent(id, kind, at).await
    }
}

/// Records every notification; fails all of them when `fail` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, what: String) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError("smtp unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(what);
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_confirmation(&self, appointment: &Appointment) -> Result<(), NotifyError> {
        self.record(format!("confirmation:{}", appointment.id))
    }

    async fn send_cancellation(&self, appointment: &Appointment) -> Result<(), NotifyError> {
        self.record(format!("cancellation:{}", appointment.id))
    }

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        kind: ReminderKind,
    ) -> Result<(), NotifyError> {
        self.record(format!("{:?}:{}", kind, appointment.id))
    }
}

/// Calendar fake that counts calls and can fail or hang.
#[derive(Default)]
pub struct FakeCalendar {
    pub fail: bool,
    pub hang: bool,
    pub created: AtomicUsize,
    pub updated: Mutex<Vec<EventUpdate>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeCalendar {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    async fn stall(&self) {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

#[async_trait]
impl CalendarSync for FakeCalendar {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn create_event(&self, _event: &CalendarEvent) -> Option<String> {
        self.stall().await;
        if self.fail {
            return None;
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        Some(format!("evt-{n}"))
    }

    async fn update_event(&self, _event_id: &str, update: &EventUpdate) -> bool {
        self.stall().await;
        self.updated.lock().unwrap().push(update.clone());
        !self.fail
    }

    async fn delete_event(&self, event_id: &str) -> bool {
        self.stall().await;
        self.deleted.lock().unwrap().push(event_id.to_string());
        !self.fail
    }
}
