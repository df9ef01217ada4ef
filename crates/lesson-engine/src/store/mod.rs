//! Persistence seams consumed by the scheduling core.
//!
//! The core only needs lookups by id, per-tutor range queries and
//! per-course existence checks. Each trait is object-safe so a process can
//! choose its backend once at start-up and share it as `Arc<dyn ...>`.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Appointment, Availability, Course, Role, User};
use crate::notify::ReminderKind;

pub use memory::{MemoryStore, Snapshot};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backstop for the check-then-insert race: two scheduled appointments
    /// of one tutor may never share a start time.
    #[error("tutor {tutor_id} already has a scheduled appointment starting at {start}")]
    DuplicateSlot { tutor_id: Uuid, start: DateTime<Utc> },

    #[error("appointment {0} already exists")]
    DuplicateId(Uuid),

    #[error("appointment {0} does not exist")]
    Missing(Uuid),

    #[error("invalid snapshot: {0}")]
    Snapshot(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the user only when it exists and holds `role`.
    async fn find_user(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError>;

    async fn active_courses(&self) -> Result<Vec<Course>, StoreError>;

    /// Add `delta` hours to the balance and recompute `needs_renewal` in the
    /// same step. Returns the updated course, or `None` if it does not exist.
    async fn adjust_hours(
        &self,
        course_id: Uuid,
        delta: f64,
    ) -> Result<Option<Course>, StoreError>;
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn availability_for_tutor(&self, tutor_id: Uuid) -> Result<Vec<Availability>, StoreError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Every appointment of `tutor_id`, in any status, intersecting `[from, to)`.
    async fn tutor_appointments_between(
        &self,
        tutor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Every appointment, in any status, whose start lies in `[from, to)`.
    async fn appointments_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// True when a non-cancelled appointment of `course_id` starts at `start`.
    async fn exists_for_course_at(
        &self,
        course_id: Uuid,
        start: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Insert all appointments or none of them.
    async fn insert_batch(&self, appointments: &[Appointment]) -> Result<(), StoreError>;

    /// Overwrite an existing appointment.
    async fn save(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Set `confirmation_sent_at` and nothing else, only while the appointment
    /// is still `Scheduled`. Returns whether the flag was written.
    async fn mark_confirmation_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Set the flag for `kind` and nothing else, only while the appointment is
    /// still `Scheduled`. Returns whether the flag was written.
    async fn mark_reminder_sent(
        &self,
        id: Uuid,
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// The store handles the scheduling components are built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserDirectory>,
    pub courses: Arc<dyn CourseStore>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub appointments: Arc<dyn AppointmentStore>,
}

impl Stores {
    /// Use one backend for every store role.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserDirectory + CourseStore + AvailabilityStore + AppointmentStore + 'static,
    {
        Self {
            users: store.clone(),
            courses: store.clone(),
            availability: store.clone(),
            appointments: store,
        }
    }
}
