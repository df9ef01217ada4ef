//! Tutor availability validation.
//!
//! A proposed `[start, end)` is available when one of the tutor's records
//! fully contains it on the local wall clock: first the weekly records for
//! that weekday, then the records pinned to that calendar date.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Availability, AvailabilityWindow};
use crate::store::AvailabilityStore;
use crate::timerange::{day_of_week, local_date, time_of_day};

/// Returns `true` when some record in `records` contains `[start, end)`.
///
/// Times of day are compared as `"HH:MM"` strings within one local day, so a
/// range crossing local midnight is never contained.
pub fn is_covered(
    records: &[Availability],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
) -> bool {
    if end <= start {
        return false;
    }

    let date = local_date(start, tz);
    if local_date(end, tz) != date {
        debug!(%start, %end, "range crosses local midnight");
        return false;
    }

    let day = day_of_week(date);
    let time_start = time_of_day(start, tz);
    let time_end = time_of_day(end, tz);

    let recurring = records.iter().any(|r| {
        matches!(r.window, AvailabilityWindow::Recurring { day_of_week } if day_of_week == day)
            && r.contains(&time_start, &time_end)
    });
    if recurring {
        return true;
    }

    records.iter().any(|r| {
        matches!(r.window, AvailabilityWindow::SpecificDate { date: d } if d == date)
            && r.contains(&time_start, &time_end)
    })
}

pub struct AvailabilityValidator {
    store: Arc<dyn AvailabilityStore>,
    tz: Tz,
}

impl AvailabilityValidator {
    pub fn new(store: Arc<dyn AvailabilityStore>, tz: Tz) -> Self {
        Self { store, tz }
    }

    /// Whether `tutor_id` declared availability covering `[start, end)`.
    pub async fn is_available(
        &self,
        tutor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let records = self.store.availability_for_tutor(tutor_id).await?;
        Ok(is_covered(&records, start, end, self.tz))
    }
}
