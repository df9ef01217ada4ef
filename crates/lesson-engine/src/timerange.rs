//! Pure helpers over half-open `[start, end)` time ranges.
//!
//! Adjacent ranges (one ends exactly when the other starts) do NOT overlap.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::error::{Result, SchedulingError};

/// Returns `true` when `[a_start, a_end)` and `[b_start, b_end)` intersect.
///
/// Covers a range starting inside the other, containing it, or ending inside
/// it with the single predicate `a_start < b_end && b_start < a_end`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Minutes shared by two ranges, zero when they do not overlap.
pub fn overlap_minutes(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> i64 {
    if !overlaps(a_start, a_end, b_start, b_end) {
        return 0;
    }
    (a_end.min(b_end) - a_start.max(b_start)).num_minutes()
}

/// Length of `[start, end)` in hours. Fractional hours are kept.
pub fn duration_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / 3600.0
}

/// Zero-padded 24-hour `"HH:MM"` of `instant` on the wall clock of `tz`.
///
/// Availability records store times in this form, so two values compare
/// correctly as plain strings.
pub fn time_of_day(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

/// Calendar date of `instant` on the wall clock of `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Day-of-week index with Sunday = 0 through Saturday = 6.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Parse a strict `"HH:MM"` time of day.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    if value.len() != 5 {
        return Err(SchedulingError::InvalidTime(value.to_string()));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| SchedulingError::InvalidTime(value.to_string()))
}

