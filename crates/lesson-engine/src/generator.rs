//! Recurring appointment generation from course schedule slots.
//!
//! Each run walks `[max(today, course start), today + horizon]` for every
//! active course and materializes the missing weekly lessons, deducting
//! their hours from the course balance. Re-running over the same window
//! creates nothing new. An occurrence the tutor is already booked for is
//! skipped and counted; the rest of the course still generates.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::find_conflicts;
use crate::error::{EntityKind, Result, SchedulingError};
use crate::model::{Appointment, Course};
use crate::recurrence::{expand_weekly_slot, Occurrence};
use crate::store::{AppointmentStore, CourseStore};
use crate::timerange::{local_date, overlaps};

/// A course whose generation failed; other courses were still processed.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseFailure {
    pub course_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Courses with at least one slot and one student that were walked.
    pub courses_processed: usize,
    /// Active courses without slots or without students.
    pub courses_skipped: usize,
    pub created: usize,
    /// Instances skipped because a live appointment already holds them.
    pub already_present: usize,
    /// Instances skipped because the tutor has another lesson at that time.
    pub clashes: usize,
    /// Courses flagged for renewal after this run.
    pub needs_renewal: Vec<Uuid>,
    pub failures: Vec<CourseFailure>,
}

struct CourseOutcome {
    created: usize,
    already_present: usize,
    clashes: usize,
    needs_renewal: bool,
}

pub struct RecurringGenerator {
    courses: Arc<dyn CourseStore>,
    appointments: Arc<dyn AppointmentStore>,
    tz: Tz,
    horizon_days: u32,
}

impl RecurringGenerator {
    pub fn new(
        courses: Arc<dyn CourseStore>,
        appointments: Arc<dyn AppointmentStore>,
        tz: Tz,
        horizon_days: u32,
    ) -> Self {
        Self {
            courses,
            appointments,
            tz,
            horizon_days,
        }
    }

    /// Generate the upcoming lessons of every active course.
    ///
    /// # Errors
    /// Only a failure to list the active courses aborts the run; a failing
    /// course is logged, recorded in the report and skipped.
    pub async fn generate(&self, now: DateTime<Utc>) -> Result<GenerationReport> {
        let today = local_date(now, self.tz);
        let courses = self.courses.active_courses().await?;
        let mut report = GenerationReport::default();

        for course in courses {
            if course.schedule.is_empty() || course.student_ids.is_empty() {
                debug!(course_id = %course.id, "course has no slots or no students");
                report.courses_skipped += 1;
                continue;
            }

            let course_id = course.id;
            match self.generate_for_course(course, today).await {
                Ok(outcome) => {
                    report.courses_processed += 1;
                    report.created += outcome.created;
                    report.already_present += outcome.already_present;
                    report.clashes += outcome.clashes;
                    if outcome.needs_renewal {
                        report.needs_renewal.push(course_id);
                    }
                }
                Err(e) => {
                    warn!(
                        course_id = %course_id,
                        error = %e,
                        "appointment generation failed for course"
                    );
                    report.failures.push(CourseFailure {
                        course_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            created = report.created,
            already_present = report.already_present,
            clashes = report.clashes,
            processed = report.courses_processed,
            failed = report.failures.len(),
            "recurring generation finished"
        );
        Ok(report)
    }

    async fn generate_for_course(&self, course: Course, today: NaiveDate) -> Result<CourseOutcome> {
        let from = today.max(course.start_date);
        let through = today + Days::new(u64::from(self.horizon_days));
        let student_ids: Vec<Uuid> = course.student_ids.iter().copied().collect();

        let mut pending: Vec<Appointment> = Vec::new();
        let mut already_present = 0;
        let mut clashes = 0;
        let mut hours = 0.0;

        for slot in &course.schedule {
            for occurrence in expand_weekly_slot(slot, from, through, self.tz)? {
                if pending.iter().any(|a| a.start == occurrence.start)
                    || self
                        .appointments
                        .exists_for_course_at(course.id, occurrence.start)
                        .await?
                {
                    already_present += 1;
                    continue;
                }

                if self.tutor_is_busy(course.tutor_id, &occurrence, &pending).await? {
                    debug!(
                        course_id = %course.id,
                        start = %occurrence.start,
                        "tutor already booked, occurrence skipped"
                    );
                    clashes += 1;
                    continue;
                }

                let appointment = Appointment::scheduled(
                    course.tutor_id,
                    student_ids.clone(),
                    Some(course.id),
                    occurrence.start,
                    occurrence.end,
                )?;
                hours += appointment.duration_hours();
                pending.push(appointment);
            }
        }

        if !pending.is_empty() {
            self.appointments.insert_batch(&pending).await?;
        }

        // Applied as a delta so a concurrent credit-back is not overwritten.
        let updated = self
            .courses
            .adjust_hours(course.id, -hours)
            .await?
            .ok_or(SchedulingError::not_found(EntityKind::Course, course.id))?;

        if !pending.is_empty() {
            info!(
                course_id = %course.id,
                created = pending.len(),
                hours_balance = updated.hours_balance,
                needs_renewal = updated.needs_renewal,
                "generated course appointments"
            );
        }

        Ok(CourseOutcome {
            created: pending.len(),
            already_present,
            clashes,
            needs_renewal: updated.needs_renewal,
        })
    }

    /// True when a scheduled lesson of the tutor, stored or about to be
    /// inserted, overlaps the occurrence.
    async fn tutor_is_busy(
        &self,
        tutor_id: Uuid,
        occurrence: &Occurrence,
        pending: &[Appointment],
    ) -> Result<bool> {
        if pending
            .iter()
            .any(|a| overlaps(a.start, a.end, occurrence.start, occurrence.end))
        {
            return Ok(true);
        }
        let existing = self
            .appointments
            .tutor_appointments_between(tutor_id, occurrence.start, occurrence.end)
            .await?;
        Ok(!find_conflicts(&existing, occurrence.start, occurrence.end, None).is_empty())
    }
}
