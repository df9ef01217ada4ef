//! In-memory backend implementing every store trait.
//!
//! All state sits behind one async mutex, so the duplicate-slot check and
//! the write it guards happen under the same lock.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AppointmentStore, AvailabilityStore, CourseStore, StoreError, UserDirectory};
use crate::model::{Appointment, AppointmentStatus, Availability, Course, Role, User};
use crate::notify::ReminderKind;
use crate::timerange::overlaps;

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub availability: Vec<Availability>,
    #[serde(default)]
    pub appointments: Vec<Appointment>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    courses: BTreeMap<Uuid, Course>,
    availability: Vec<Availability>,
    appointments: HashMap<Uuid, Appointment>,
}

impl State {
    fn scheduled_mut(&mut self, id: Uuid) -> Option<&mut Appointment> {
        self.appointments
            .get_mut(&id)
            .filter(|a| a.status == AppointmentStatus::Scheduled)
    }

    /// A scheduled appointment of the same tutor starting at the same instant.
    fn slot_taken(&self, candidate: &Appointment) -> bool {
        candidate.status == AppointmentStatus::Scheduled
            && self.appointments.values().any(|existing| {
                existing.id != candidate.id
                    && existing.status == AppointmentStatus::Scheduled
                    && existing.tutor_id == candidate.tutor_id
                    && existing.start == candidate.start
            })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, validating availability records and schedule slots.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, StoreError> {
        let mut state = State::default();

        for user in snapshot.users {
            state.users.insert(user.id, user);
        }
        for course in snapshot.courses {
            for slot in &course.schedule {
                slot.validate()
                    .map_err(|e| StoreError::Snapshot(format!("course {}: {}", course.id, e)))?;
            }
            state.courses.insert(course.id, course);
        }
        for availability in snapshot.availability {
            availability
                .validate()
                .map_err(|e| {
                    StoreError::Snapshot(format!("availability {}: {}", availability.id, e))
                })?;
            state.availability.push(availability);
        }
        for appointment in snapshot.appointments {
            if appointment.end <= appointment.start {
                return Err(StoreError::Snapshot(format!(
                    "appointment {} ends before it starts",
                    appointment.id
                )));
            }
            if state.appointments.contains_key(&appointment.id) {
                return Err(StoreError::DuplicateId(appointment.id));
            }
            state.appointments.insert(appointment.id, appointment);
        }

        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Export the current contents, appointments ordered by start time.
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;

        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        let mut appointments: Vec<Appointment> = state.appointments.values().cloned().collect();
        appointments.sort_by_key(|a| (a.start, a.id));

        Snapshot {
            users,
            courses: state.courses.values().cloned().collect(),
            availability: state.availability.clone(),
            appointments,
        }
    }

    pub async fn put_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn put_course(&self, course: Course) {
        self.state.lock().await.courses.insert(course.id, course);
    }

    pub async fn put_availability(&self, availability: Availability) {
        self.state.lock().await.availability.push(availability);
    }

    /// All appointments ordered by start time.
    pub async fn appointments(&self) -> Vec<Appointment> {
        self.snapshot().await.appointments
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).filter(|u| u.role == role).cloned())
    }
}

#[async_trait]
impl CourseStore for MemoryStore {
    async fn find_course(&self, id: Uuid) -> Result<Option<Course>, StoreError> {
        Ok(self.state.lock().await.courses.get(&id).cloned())
    }

    async fn active_courses(&self) -> Result<Vec<Course>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.courses.values().filter(|c| c.active).cloned().collect())
    }

    async fn adjust_hours(
        &self,
        course_id: Uuid,
        delta: f64,
    ) -> Result<Option<Course>, StoreError> {
        let mut state = self.state.lock().await;
        Ok(state.courses.get_mut(&course_id).map(|course| {
            course.hours_balance += delta;
            course.needs_renewal = course.hours_balance <= 0.0;
            course.clone()
        }))
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn availability_for_tutor(
        &self,
        tutor_id: Uuid,
    ) -> Result<Vec<Availability>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .availability
            .iter()
            .filter(|a| a.tutor_id == tutor_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn find_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.state.lock().await.appointments.get(&id).cloned())
    }

    async fn tutor_appointments_between(
        &self,
        tutor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.tutor_id == tutor_id && overlaps(a.start, a.end, from, to))
            .cloned()
            .collect())
    }

    async fn appointments_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let state = self.state.lock().await;
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.start >= from && a.start < to)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start);
        Ok(found)
    }

    async fn exists_for_course_at(
        &self,
        course_id: Uuid,
        start: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.appointments.values().any(|a| {
            a.course_id == Some(course_id)
                && a.start == start
                && a.status != AppointmentStatus::Cancelled
        }))
    }

    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        self.insert_batch(std::slice::from_ref(appointment)).await
    }

    async fn insert_batch(&self, appointments: &[Appointment]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        // Validate the whole batch, including collisions inside it, before writing.
        let mut staged = State::default();
        for appointment in appointments {
            if state.appointments.contains_key(&appointment.id)
                || staged.appointments.contains_key(&appointment.id)
            {
                return Err(StoreError::DuplicateId(appointment.id));
            }
            if state.slot_taken(appointment) || staged.slot_taken(appointment) {
                return Err(StoreError::DuplicateSlot {
                    tutor_id: appointment.tutor_id,
                    start: appointment.start,
                });
            }
            staged.appointments.insert(appointment.id, appointment.clone());
        }

        state.appointments.extend(staged.appointments);
        Ok(())
    }

    async fn save(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.appointments.contains_key(&appointment.id) {
            return Err(StoreError::Missing(appointment.id));
        }
        if state.slot_taken(appointment) {
            return Err(StoreError::DuplicateSlot {
                tutor_id: appointment.tutor_id,
                start: appointment.start,
            });
        }
        state.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn mark_confirmation_sent(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(appointment) = state.scheduled_mut(id) else {
            return Ok(false);
        };
        appointment.confirmation_sent_at = Some(at);
        Ok(true)
    }

    async fn mark_reminder_sent(
        &self,
        id: Uuid,
        kind: ReminderKind,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(appointment) = state.scheduled_mut(id) else {
            return Ok(false);
        };
        match kind {
            ReminderKind::DayBefore => appointment.day_before_reminder_sent_at = Some(at),
            ReminderKind::Upcoming => appointment.reminder_sent_at = Some(at),
        }
        Ok(true)
    }
}
