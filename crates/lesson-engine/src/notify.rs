//! Notification sender seam and the fire-and-forget dispatcher around it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::model::Appointment;
use crate::store::AppointmentStore;

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// Sent roughly a day ahead.
    DayBefore,
    /// Sent shortly before the lesson starts.
    Upcoming,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_confirmation(&self, appointment: &Appointment) -> Result<(), NotifyError>;

    async fn send_cancellation(&self, appointment: &Appointment) -> Result<(), NotifyError>;

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        kind: ReminderKind,
    ) -> Result<(), NotifyError>;
}

/// Writes each notification to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_confirmation(&self, appointment: &Appointment) -> Result<(), NotifyError> {
        info!(appointment_id = %appointment.id, start = %appointment.start, "confirmation");
        Ok(())
    }

    async fn send_cancellation(&self, appointment: &Appointment) -> Result<(), NotifyError> {
        info!(appointment_id = %appointment.id, start = %appointment.start, "cancellation");
        Ok(())
    }

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        kind: ReminderKind,
    ) -> Result<(), NotifyError> {
        info!(appointment_id = %appointment.id, ?kind, start = %appointment.start, "reminder");
        Ok(())
    }
}

/// Send `call` through `timeout`, folding an elapsed timer into `NotifyError`.
pub(crate) async fn send_with_timeout<F>(timeout: Duration, call: F) -> Result<(), NotifyError>
where
    F: std::future::Future<Output = Result<(), NotifyError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(NotifyError(format!("timed out after {}ms", timeout.as_millis()))),
    }
}

/// Runs notifications as detached tasks with their own error boundary.
///
/// Callers never observe the outcome. [`Dispatcher::drain`] waits for the
/// tasks in flight, for shutdown and tests.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    appointments: Arc<dyn AppointmentStore>,
    timeout: Duration,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        appointments: Arc<dyn AppointmentStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            appointments,
            timeout,
            tracker: TaskTracker::new(),
        }
    }

    /// Send a booking confirmation, then record that it went out.
    pub fn confirmation(&self, appointment: Appointment) {
        let notifier = self.notifier.clone();
        let appointments = self.appointments.clone();
        let timeout = self.timeout;
        self.tracker.spawn(async move {
            let id = appointment.id;
            match send_with_timeout(timeout, notifier.send_confirmation(&appointment)).await {
                Ok(()) => mark_confirmation_sent(appointments.as_ref(), id).await,
                Err(e) => warn!(appointment_id = %id, error = %e, "confirmation not sent"),
            }
        });
    }

    pub fn cancellation(&self, appointment: Appointment) {
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        self.tracker.spawn(async move {
            let call = notifier.send_cancellation(&appointment);
            if let Err(e) = send_with_timeout(timeout, call).await {
                warn!(appointment_id = %appointment.id, error = %e, "cancellation notice not sent");
            }
        });
    }

    /// Wait until every dispatched notification has finished.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

async fn mark_confirmation_sent(appointments: &dyn AppointmentStore, id: Uuid) {
    match appointments.mark_confirmation_sent(id, Utc::now()).await {
        Ok(true) => {}
        Ok(false) => debug!(appointment_id = %id, "confirmation not recorded, no longer scheduled"),
        Err(e) => warn!(appointment_id = %id, error = %e, "could not record confirmation"),
    }
}
