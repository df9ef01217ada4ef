//! Domain records shared by the scheduling components.
//!
//! Relations are explicit id references. Nothing here loads related records
//! lazily; callers resolve ids through the store traits in [`crate::store`].

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulingError};
use crate::timerange::{duration_hours, parse_time_of_day};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Tutor,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
}

/// Lifecycle state of an appointment.
///
/// `Scheduled` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed
                    | AppointmentStatus::Cancelled
                    | AppointmentStatus::NoShow
            )
        )
    }

    pub fn is_terminal(self) -> bool {
        self != AppointmentStatus::Scheduled
    }
}

/// A concrete lesson between one tutor and one or more students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tutor_id: Uuid,
    pub student_ids: Vec<Uuid>,
    #[serde(default)]
    pub course_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub calendar_event_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reminder_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub day_before_reminder_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirmation_sent_at: Option<DateTime<Utc>>,
    /// Set only when the appointment is cancelled.
    #[serde(default)]
    pub credited_back: Option<bool>,
}

impl Appointment {
    /// Build a new `Scheduled` appointment with a fresh id.
    ///
    /// # Errors
    /// `InvalidInterval` unless `end > start`; `NoStudents` for an empty roster.
    pub fn scheduled(
        tutor_id: Uuid,
        student_ids: Vec<Uuid>,
        course_id: Option<Uuid>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self> {
        if end <= start {
            return Err(SchedulingError::InvalidInterval);
        }
        if student_ids.is_empty() {
            return Err(SchedulingError::NoStudents);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            tutor_id,
            student_ids,
            course_id,
            start,
            end,
            status: AppointmentStatus::Scheduled,
            calendar_event_id: None,
            notes: None,
            reminder_sent_at: None,
            day_before_reminder_sent_at: None,
            confirmation_sent_at: None,
            credited_back: None,
        })
    }

    pub fn duration_hours(&self) -> f64 {
        duration_hours(self.start, self.end)
    }

    pub fn reminder_sent(&self) -> bool {
        self.reminder_sent_at.is_some()
    }

    pub fn day_before_reminder_sent(&self) -> bool {
        self.day_before_reminder_sent_at.is_some()
    }

    pub fn confirmation_email_sent(&self) -> bool {
        self.confirmation_sent_at.is_some()
    }

    /// Move to `next`, rejecting transitions out of a terminal state.
    pub fn transition_to(&mut self, next: AppointmentStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulingError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// Whether an availability record repeats weekly or applies to one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvailabilityWindow {
    /// Every week on `day_of_week` (0 = Sunday).
    Recurring { day_of_week: u8 },
    SpecificDate { date: NaiveDate },
}

/// A tutor's declared open time on the local wall clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub id: Uuid,
    pub tutor_id: Uuid,
    #[serde(flatten)]
    pub window: AvailabilityWindow,
    pub start_time: String,
    pub end_time: String,
}

impl Availability {
    pub fn recurring(
        tutor_id: Uuid,
        day_of_week: u8,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self> {
        Self::new(
            tutor_id,
            AvailabilityWindow::Recurring { day_of_week },
            start_time,
            end_time,
        )
    }

    pub fn on_date(
        tutor_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self> {
        Self::new(
            tutor_id,
            AvailabilityWindow::SpecificDate { date },
            start_time,
            end_time,
        )
    }

    fn new(
        tutor_id: Uuid,
        window: AvailabilityWindow,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self> {
        let availability = Self {
            id: Uuid::new_v4(),
            tutor_id,
            window,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        };
        availability.validate()?;
        Ok(availability)
    }

    /// Check the `"HH:MM"` bounds and the day-of-week range.
    pub fn validate(&self) -> Result<()> {
        validate_day_of_week_window(&self.window)?;
        validate_time_range(&self.start_time, &self.end_time)
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.window, AvailabilityWindow::Recurring { .. })
    }

    /// True when `[time_start, time_end]` lies inside this record's hours.
    pub fn contains(&self, time_start: &str, time_end: &str) -> bool {
        self.start_time.as_str() <= time_start && self.end_time.as_str() >= time_end
    }
}

/// Weekly template a course uses to generate appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub id: Uuid,
    /// 0 = Sunday.
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
}

impl ScheduleSlot {
    pub fn new(day_of_week: u8, start_time: &str, end_time: &str) -> Result<Self> {
        let slot = Self {
            id: Uuid::new_v4(),
            day_of_week,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        };
        slot.validate()?;
        Ok(slot)
    }

    pub fn validate(&self) -> Result<()> {
        validate_day_of_week(self.day_of_week)?;
        validate_time_range(&self.start_time, &self.end_time)
    }
}

/// The parts of a course the scheduler reads and the hour ledger it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub active: bool,
    pub start_date: NaiveDate,
    pub hours_balance: f64,
    #[serde(default)]
    pub needs_renewal: bool,
    pub tutor_id: Uuid,
    #[serde(default)]
    pub student_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub schedule: Vec<ScheduleSlot>,
}

fn validate_day_of_week_window(window: &AvailabilityWindow) -> Result<()> {
    match window {
        AvailabilityWindow::Recurring { day_of_week } => validate_day_of_week(*day_of_week),
        AvailabilityWindow::SpecificDate { .. } => Ok(()),
    }
}

fn validate_day_of_week(day_of_week: u8) -> Result<()> {
    if day_of_week > 6 {
        return Err(SchedulingError::InvalidTime(format!(
            "day of week {day_of_week} is outside 0..=6"
        )));
    }
    Ok(())
}

fn validate_time_range(start_time: &str, end_time: &str) -> Result<()> {
    parse_time_of_day(start_time)?;
    parse_time_of_day(end_time)?;
    if start_time >= end_time {
        return Err(SchedulingError::InvalidTime(format!(
            "{start_time} is not before {end_time}"
        )));
    }
    Ok(())
}
