//! Engine configuration loaded with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. A TOML file (`./lessons.toml`, or an explicit path)
//! 3. `LESSONS_*` environment variables, `__` separating nested keys
//!    (e.g. `LESSONS_REMINDER__LEAD_MINUTES=30`)

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulingError};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// IANA timezone the availability and schedule wall-clock times live in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Days past today the recurring generator materializes.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Upper bound on any single calendar or notification call.
    #[serde(default = "default_external_timeout_ms")]
    pub external_timeout_ms: u64,

    #[serde(default)]
    pub reminder: ReminderConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReminderConfig {
    /// Short-lead reminder is sent once the lesson starts within this many minutes.
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: u32,

    /// Day-before reminder is sent once the lesson starts within this many hours.
    #[serde(default = "default_day_before_hours")]
    pub day_before_hours: u32,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_horizon_days() -> u32 {
    28
}

fn default_external_timeout_ms() -> u64 {
    5_000
}

fn default_lead_minutes() -> u32 {
    60
}

fn default_day_before_hours() -> u32 {
    24
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            horizon_days: default_horizon_days(),
            external_timeout_ms: default_external_timeout_ms(),
            reminder: ReminderConfig::default(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead_minutes: default_lead_minutes(),
            day_before_hours: default_day_before_hours(),
        }
    }
}

impl EngineConfig {
    /// Parse the configured timezone.
    ///
    /// # Errors
    /// `InvalidTimezone` if the name is not a known IANA identifier.
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| SchedulingError::InvalidTimezone(self.timezone.clone()))
    }

    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }
}

/// Defaults, then `./lessons.toml` when present, then `LESSONS_*` variables.
pub fn load_config() -> std::result::Result<EngineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EngineConfig::default()))
        .merge(Toml::file("lessons.toml"))
        .merge(env_provider())
        .extract()
}

/// Defaults, then the given file, then `LESSONS_*` variables.
///
/// Unlike [`load_config`], a missing file is an error: the caller named it.
pub fn load_config_from_path(path: &Path) -> std::result::Result<EngineConfig, figment::Error> {
    if !path.is_file() {
        let message = format!("config file not found: {}", path.display());
        return Err(figment::Error::from(message));
    }
    Figment::new()
        .merge(Serialized::defaults(EngineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Defaults overridden by an in-memory TOML document only.
pub fn load_config_from_str(
    toml_content: &str,
) -> std::result::Result<EngineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EngineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

fn env_provider() -> Env {
    Env::prefixed("LESSONS_").split("__")
}
