//! Appointment lifecycle: create, update, cancel, complete.
//!
//! Calendar sync and notifications are best-effort. They run after the
//! state they describe is settled, and their failures are logged and never
//! undo or fail the operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityValidator;
use crate::calendar::{BestEffortCalendar, CalendarEvent, CalendarSync, EventUpdate};
use crate::config::EngineConfig;
use crate::conflict::ConflictDetector;
use crate::error::{EntityKind, Result, SchedulingError, ValidationConflict};
use crate::model::{Appointment, AppointmentStatus, Role, User};
use crate::notify::{Dispatcher, Notifier};
use crate::store::{AppointmentStore, CourseStore, Stores, UserDirectory};

/// A booking request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub student_ids: Vec<Uuid>,
    pub tutor_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub course_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
}

pub struct AppointmentManager {
    users: Arc<dyn UserDirectory>,
    courses: Arc<dyn CourseStore>,
    appointments: Arc<dyn AppointmentStore>,
    availability: AvailabilityValidator,
    conflicts: ConflictDetector,
    calendar: BestEffortCalendar,
    dispatcher: Dispatcher,
}

impl AppointmentManager {
    pub fn new(
        stores: Stores,
        calendar: Arc<dyn CalendarSync>,
        notifier: Arc<dyn Notifier>,
        tz: Tz,
        config: &EngineConfig,
    ) -> Self {
        let timeout = config.external_timeout();
        Self {
            availability: AvailabilityValidator::new(stores.availability.clone(), tz),
            conflicts: ConflictDetector::new(stores.appointments.clone()),
            calendar: BestEffortCalendar::new(calendar, timeout),
            dispatcher: Dispatcher::new(notifier, stores.appointments.clone(), timeout),
            users: stores.users,
            courses: stores.courses,
            appointments: stores.appointments,
        }
    }

    /// Wait for dispatched notifications to finish.
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    pub async fn get(&self, id: Uuid) -> Result<Appointment> {
        self.appointments
            .find_appointment(id)
            .await?
            .ok_or(SchedulingError::not_found(EntityKind::Appointment, id))
    }

    /// Book a new appointment.
    ///
    /// # Errors
    /// `NotFound` for an unknown student, tutor or course;
    /// `Validation` when the time lies outside the tutor's availability or
    /// overlaps one of the tutor's scheduled appointments. Nothing is
    /// persisted on error.
    pub async fn create(&self, request: NewAppointment) -> Result<Appointment> {
        if request.end <= request.start {
            return Err(SchedulingError::InvalidInterval);
        }
        if request.student_ids.is_empty() {
            return Err(SchedulingError::NoStudents);
        }

        let mut attendees = Vec::with_capacity(request.student_ids.len() + 1);
        for student_id in &request.student_ids {
            attendees.push(self.resolve_user(*student_id, Role::Student).await?);
        }
        let tutor = self.resolve_user(request.tutor_id, Role::Tutor).await?;
        if let Some(course_id) = request.course_id {
            if self.courses.find_course(course_id).await?.is_none() {
                return Err(SchedulingError::not_found(EntityKind::Course, course_id));
            }
        }

        self.check_slot(request.tutor_id, request.start, request.end, None)
            .await?;

        let mut appointment = Appointment::scheduled(
            request.tutor_id,
            request.student_ids,
            request.course_id,
            request.start,
            request.end,
        )?;
        appointment.notes = request.notes;

        let event = CalendarEvent {
            summary: format!("Lesson with {}", tutor.name),
            description: appointment.notes.clone().unwrap_or_default(),
            start: appointment.start,
            end: appointment.end,
            attendee_emails: attendees
                .iter()
                .chain(std::iter::once(&tutor))
                .map(|u| u.email.clone())
                .collect(),
        };
        appointment.calendar_event_id = self.calendar.create(&event).await;

        if let Err(e) = self.appointments.insert(&appointment).await {
            if let Some(event_id) = &appointment.calendar_event_id {
                self.calendar.delete(event_id).await;
            }
            return Err(e.into());
        }

        info!(
            appointment_id = %appointment.id,
            tutor_id = %appointment.tutor_id,
            start = %appointment.start,
            "appointment created"
        );
        self.dispatcher.confirmation(appointment.clone());
        Ok(appointment)
    }

    /// Apply a partial update, re-validating the slot when the time moves.
    pub async fn update(&self, id: Uuid, patch: AppointmentPatch) -> Result<Appointment> {
        let mut appointment = self.get(id).await?;

        let start = patch.start.unwrap_or(appointment.start);
        let end = patch.end.unwrap_or(appointment.end);
        let time_changed = start != appointment.start || end != appointment.end;

        if time_changed {
            if end <= start {
                return Err(SchedulingError::InvalidInterval);
            }
            self.check_slot(appointment.tutor_id, start, end, Some(id))
                .await?;
        }

        let cancelling = match patch.status {
            Some(next) if next != appointment.status => {
                appointment.transition_to(next)?;
                next == AppointmentStatus::Cancelled
            }
            _ => false,
        };

        if time_changed {
            appointment.start = start;
            appointment.end = end;
            if let Some(event_id) = &appointment.calendar_event_id {
                let update = EventUpdate {
                    start: Some(start),
                    end: Some(end),
                    ..EventUpdate::default()
                };
                self.calendar.update(event_id, &update).await;
            }
        }

        if cancelling {
            if let Some(event_id) = appointment.calendar_event_id.clone() {
                if self.calendar.delete(&event_id).await {
                    appointment.calendar_event_id = None;
                }
            }
        }

        if let Some(notes) = patch.notes {
            appointment.notes = Some(notes);
        }

        self.appointments.save(&appointment).await?;
        info!(appointment_id = %id, status = ?appointment.status, "appointment updated");
        Ok(appointment)
    }

    /// Cancel an appointment, optionally crediting its hours back to the course.
    pub async fn cancel(&self, id: Uuid, credit_hours_back: bool) -> Result<Appointment> {
        let mut appointment = self.get(id).await?;
        appointment.transition_to(AppointmentStatus::Cancelled)?;

        let credit_course = match appointment.course_id {
            Some(course_id) if credit_hours_back => {
                if self.courses.find_course(course_id).await?.is_none() {
                    return Err(SchedulingError::not_found(EntityKind::Course, course_id));
                }
                Some(course_id)
            }
            _ => None,
        };
        appointment.credited_back = Some(credit_course.is_some());

        self.appointments.save(&appointment).await?;

        if let Some(course_id) = credit_course {
            let course = self
                .courses
                .adjust_hours(course_id, appointment.duration_hours())
                .await?
                .ok_or(SchedulingError::not_found(EntityKind::Course, course_id))?;
            info!(
                course_id = %course.id,
                hours_balance = course.hours_balance,
                "hours credited back"
            );
        }

        info!(appointment_id = %id, credited_back = credit_hours_back, "appointment cancelled");

        if let Some(event_id) = appointment.calendar_event_id.clone() {
            if self.calendar.delete(&event_id).await {
                appointment.calendar_event_id = None;
                if let Err(e) = self.appointments.save(&appointment).await {
                    warn!(appointment_id = %id, error = %e, "could not clear calendar event id");
                }
            }
        }
        self.dispatcher.cancellation(appointment.clone());
        Ok(appointment)
    }

    pub async fn complete(&self, id: Uuid) -> Result<Appointment> {
        let mut appointment = self.get(id).await?;
        appointment.transition_to(AppointmentStatus::Completed)?;
        self.appointments.save(&appointment).await?;

        if let Some(event_id) = &appointment.calendar_event_id {
            let update = EventUpdate {
                summary: Some("Lesson (completed)".to_string()),
                ..EventUpdate::default()
            };
            self.calendar.update(event_id, &update).await;
        }

        info!(appointment_id = %id, "appointment completed");
        Ok(appointment)
    }

    pub async fn mark_no_show(&self, id: Uuid) -> Result<Appointment> {
        let mut appointment = self.get(id).await?;
        appointment.transition_to(AppointmentStatus::NoShow)?;
        self.appointments.save(&appointment).await?;
        info!(appointment_id = %id, "appointment marked no-show");
        Ok(appointment)
    }

    async fn resolve_user(&self, id: Uuid, role: Role) -> Result<User> {
        let kind = match role {
            Role::Tutor => EntityKind::Tutor,
            Role::Student | Role::Admin => EntityKind::Student,
        };
        self.users
            .find_user(id, role)
            .await?
            .ok_or(SchedulingError::not_found(kind, id))
    }

    /// Availability first, then conflicts.
    async fn check_slot(
        &self,
        tutor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<()> {
        if !self.availability.is_available(tutor_id, start, end).await? {
            return Err(ValidationConflict::OutsideAvailability.into());
        }
        if self.conflicts.has_conflict(tutor_id, start, end, exclude).await? {
            return Err(ValidationConflict::Overlap.into());
        }
        Ok(())
    }
}
