//! Error types for lesson-engine operations.

use thiserror::Error;
use uuid::Uuid;

use crate::model::AppointmentStatus;
use crate::store::StoreError;

/// Which kind of referenced record could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Student,
    Tutor,
    Course,
    Appointment,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Student => "student",
            EntityKind::Tutor => "tutor",
            EntityKind::Course => "course",
            EntityKind::Appointment => "appointment",
        };
        f.write_str(name)
    }
}

/// A proposed time the caller can correct and resubmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationConflict {
    #[error("time outside tutor availability")]
    OutsideAvailability,

    #[error("time conflicts with existing appointment")]
    Overlap,
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error(transparent)]
    Validation(#[from] ValidationConflict),

    #[error("end time must be after start time")]
    InvalidInterval,

    #[error("appointment must have at least one student")]
    NoStudents,

    #[error("cannot move appointment from {from:?} to {to:?}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid recurrence: {0}")]
    InvalidRule(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SchedulingError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        SchedulingError::NotFound { kind, id }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
