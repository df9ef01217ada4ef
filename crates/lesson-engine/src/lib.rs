//! # lesson-engine
//!
//! Scheduling core of a tutoring platform: tutor availability, appointment
//! conflict detection, the appointment lifecycle, and weekly lesson
//! generation from course schedules with hour-balance accounting.
//!
//! Persistence, calendar sync and notification delivery are collaborators
//! behind traits; [`store::MemoryStore`] implements every store trait.
//!
//! ## Modules
//!
//! - [`timerange`]: overlap, duration and wall-clock helpers
//! - [`availability`]: does a tutor's declared availability cover a range
//! - [`conflict`]: scheduled appointments overlapping a range
//! - [`lifecycle`]: create / update / cancel / complete appointments
//! - [`recurrence`]: weekly slot → concrete instances in a date window
//! - [`generator`]: batch generation of upcoming course lessons
//! - [`reminders`]: day-before and short-lead reminder sweep
//! - [`calendar`], [`notify`]: best-effort side-effect seams
//! - [`store`]: persistence traits and the in-memory backend
//! - [`config`]: Figment-loaded engine settings
//! - [`error`]: error types

pub mod availability;
pub mod calendar;
pub mod config;
pub mod conflict;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod recurrence;
pub mod reminders;
pub mod store;
pub mod timerange;

pub use availability::{is_covered, AvailabilityValidator};
pub use config::EngineConfig;
pub use conflict::{find_conflicts, Conflict, ConflictDetector};
pub use error::{SchedulingError, ValidationConflict};
pub use generator::{GenerationReport, RecurringGenerator};
pub use lifecycle::{AppointmentManager, AppointmentPatch, NewAppointment};
pub use model::{Appointment, AppointmentStatus, Availability, Course, Role, ScheduleSlot, User};
pub use store::{MemoryStore, Snapshot, Stores};
pub use timerange::{duration_hours, overlaps, time_of_day};
