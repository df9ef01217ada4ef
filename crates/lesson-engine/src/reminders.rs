//! Reminder sweep over upcoming scheduled appointments.
//!
//! Intended to run periodically. A reminder flag is only set once the
//! notifier accepted the reminder, so a failed send is retried next sweep.
//! An appointment already inside the short lead gets only the short-lead
//! reminder.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::config::ReminderConfig;
use crate::error::Result;
use crate::model::{Appointment, AppointmentStatus};
use crate::notify::{send_with_timeout, Notifier, ReminderKind};
use crate::store::AppointmentStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub day_before_sent: usize,
    pub upcoming_sent: usize,
    pub failed: usize,
}

pub struct ReminderSweep {
    appointments: Arc<dyn AppointmentStore>,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
    timeout: StdDuration,
}

impl ReminderSweep {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        config: ReminderConfig,
        timeout: StdDuration,
    ) -> Self {
        Self {
            appointments,
            notifier,
            config,
            timeout,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<ReminderReport> {
        let day_before_cutoff = now + Duration::hours(i64::from(self.config.day_before_hours));
        let upcoming_cutoff = now + Duration::minutes(i64::from(self.config.lead_minutes));
        let horizon = day_before_cutoff.max(upcoming_cutoff);

        let mut report = ReminderReport::default();
        let candidates = self.appointments.appointments_starting_between(now, horizon).await?;

        for appointment in candidates {
            if appointment.status != AppointmentStatus::Scheduled {
                continue;
            }

            // Inside the short lead the day-before reminder is stale.
            if appointment.start < upcoming_cutoff {
                if !appointment.reminder_sent()
                    && self.send(&appointment, ReminderKind::Upcoming, now, &mut report).await?
                {
                    report.upcoming_sent += 1;
                }
            } else if appointment.start < day_before_cutoff
                && !appointment.day_before_reminder_sent()
                && self.send(&appointment, ReminderKind::DayBefore, now, &mut report).await?
            {
                report.day_before_sent += 1;
            }
        }

        info!(
            day_before = report.day_before_sent,
            upcoming = report.upcoming_sent,
            failed = report.failed,
            "reminder sweep finished"
        );
        Ok(report)
    }

    /// Send one reminder and record it. `Ok(false)` when the send failed or
    /// the appointment stopped being scheduled meanwhile.
    async fn send(
        &self,
        appointment: &Appointment,
        kind: ReminderKind,
        now: DateTime<Utc>,
        report: &mut ReminderReport,
    ) -> Result<bool> {
        let call = self.notifier.send_reminder(appointment, kind);
        if let Err(e) = send_with_timeout(self.timeout, call).await {
            warn!(appointment_id = %appointment.id, ?kind, error = %e, "reminder not sent");
            report.failed += 1;
            return Ok(false);
        }
        Ok(self
            .appointments
            .mark_reminder_sent(appointment.id, kind, now)
            .await?)
    }
}
