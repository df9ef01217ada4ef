//! External calendar sync capability.
//!
//! Implementations report failure as `None`/`false` instead of erroring. The
//! scheduling core never depends on the outcome beyond storing an event id.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendee_emails: Vec<String>,
}

/// Fields to change on an existing event; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventUpdate {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait CalendarSync: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Returns the new event id, or `None` when the event could not be created.
    async fn create_event(&self, event: &CalendarEvent) -> Option<String>;

    async fn update_event(&self, event_id: &str, update: &EventUpdate) -> bool;

    async fn delete_event(&self, event_id: &str) -> bool;
}

/// Selected when no calendar integration is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCalendar;

#[async_trait]
impl CalendarSync for DisabledCalendar {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn create_event(&self, _event: &CalendarEvent) -> Option<String> {
        None
    }

    async fn update_event(&self, _event_id: &str, _update: &EventUpdate) -> bool {
        false
    }

    async fn delete_event(&self, _event_id: &str) -> bool {
        false
    }
}

/// Wraps a [`CalendarSync`] with the enabled check, a timeout and logging.
///
/// Every method resolves; a disabled, failing or hung calendar reads as
/// "nothing happened".
#[derive(Clone)]
pub(crate) struct BestEffortCalendar {
    inner: Arc<dyn CalendarSync>,
    timeout: Duration,
}

impl BestEffortCalendar {
    pub(crate) fn new(inner: Arc<dyn CalendarSync>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub(crate) async fn create(&self, event: &CalendarEvent) -> Option<String> {
        if !self.inner.is_enabled() {
            return None;
        }
        match tokio::time::timeout(self.timeout, self.inner.create_event(event)).await {
            Ok(Some(id)) => {
                debug!(event_id = %id, "calendar event created");
                Some(id)
            }
            Ok(None) => {
                warn!(start = %event.start, "calendar event could not be created");
                None
            }
            Err(_elapsed) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "calendar create timed out"
                );
                None
            }
        }
    }

    pub(crate) async fn update(&self, event_id: &str, update: &EventUpdate) -> bool {
        if !self.inner.is_enabled() {
            return false;
        }
        let ok = tokio::time::timeout(self.timeout, self.inner.update_event(event_id, update))
            .await
            .unwrap_or(false);
        if !ok {
            warn!(event_id, "calendar event update failed");
        }
        ok
    }

    pub(crate) async fn delete(&self, event_id: &str) -> bool {
        if !self.inner.is_enabled() {
            return false;
        }
        let ok = tokio::time::timeout(self.timeout, self.inner.delete_event(event_id))
            .await
            .unwrap_or(false);
        if !ok {
            warn!(event_id, "calendar event delete failed");
        }
        ok
    }
}
