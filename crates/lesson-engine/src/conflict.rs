//! Detect a tutor's scheduled appointments overlapping a proposed range.
//!
//! Only `Scheduled` appointments block a booking. Adjacent appointments
//! (one ends exactly when the other starts) are NOT conflicts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Appointment, AppointmentStatus};
use crate::store::AppointmentStore;
use crate::timerange::{overlap_minutes, overlaps};

/// An existing appointment a proposed range collides with.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub appointment: Appointment,
    pub overlap_minutes: i64,
}

/// Find every scheduled appointment in `existing` overlapping `[start, end)`.
///
/// `exclude` skips one appointment id, so an appointment being moved does
/// not collide with its own previous slot.
pub fn find_conflicts(
    existing: &[Appointment],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Vec<Conflict> {
    existing
        .iter()
        .filter(|a| a.status == AppointmentStatus::Scheduled)
        .filter(|a| Some(a.id) != exclude)
        .filter(|a| overlaps(a.start, a.end, start, end))
        .map(|a| Conflict {
            appointment: a.clone(),
            overlap_minutes: overlap_minutes(a.start, a.end, start, end),
        })
        .collect()
}

pub struct ConflictDetector {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetector {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn conflicts(
        &self,
        tutor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Conflict>> {
        let existing = self.store.tutor_appointments_between(tutor_id, start, end).await?;
        Ok(find_conflicts(&existing, start, end, exclude))
    }

    pub async fn has_conflict(
        &self,
        tutor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<bool> {
        Ok(!self.conflicts(tutor_id, start, end, exclude).await?.is_empty())
    }
}
