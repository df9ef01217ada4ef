//! Weekly slot expansion -- turns a course schedule slot into concrete
//! lesson instances inside a date window.
//!
//! Wraps the `rrule` crate (v0.13) and `chrono-tz` so a slot keeps its wall
//! clock time across DST changes in the course's timezone.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{Result, SchedulingError};
use crate::model::ScheduleSlot;
use crate::timerange::{day_of_week, local_date, parse_time_of_day};

/// One concrete instance of a weekly slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Every instance of `slot` whose local date lies in `[from, through]`.
///
/// # Errors
/// Returns `SchedulingError::InvalidTime` if the slot times are malformed or
/// not ordered, and `SchedulingError::InvalidRule` if the recurrence cannot
/// be expanded.
pub fn expand_weekly_slot(
    slot: &ScheduleSlot,
    from: NaiveDate,
    through: NaiveDate,
    tz: Tz,
) -> Result<Vec<Occurrence>> {
    slot.validate()?;
    let start_time = parse_time_of_day(&slot.start_time)?;
    let end_time = parse_time_of_day(&slot.end_time)?;

    // Anchor DTSTART on the first matching weekday so the rule never emits
    // an instance on the window's own (non-matching) first day.
    let Some(first) = from
        .iter_days()
        .take(7)
        .find(|d| day_of_week(*d) == slot.day_of_week)
    else {
        return Ok(Vec::new());
    };
    if first > through {
        return Ok(Vec::new());
    }

    let dtstart_ical = first.and_time(start_time).format("%Y%m%dT%H%M%S").to_string();

    // COUNT rather than UNTIL: with a TZID start the rrule crate only accepts
    // a UTC UNTIL, while the window is bounded in local dates.
    let max_count = u16::try_from((through - first).num_days() / 7 + 1).unwrap_or(u16::MAX);
    let rrule_text = format!(
        "DTSTART;TZID={}:{}\nRRULE:FREQ=WEEKLY;COUNT={}",
        tz.name(),
        dtstart_ical,
        max_count
    );

    let rrule_set: RRuleSet = rrule_text
        .parse()
        .map_err(|e| SchedulingError::InvalidRule(format!("{}", e)))?;

    let duration = Duration::minutes((end_time - start_time).num_minutes());

    Ok(rrule_set
        .all(max_count)
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|start| local_date(*start, tz) <= through)
        .map(|start| Occurrence {
            start,
            end: start + duration,
        })
        .collect())
}
