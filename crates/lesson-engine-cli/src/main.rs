//! `lessons` CLI: run the scheduling engine against a JSON state snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # Generate the next four weeks of course lessons, write the new state
//! lessons generate -s state.json --now 2026-03-01 -o state.json
//!
//! # Ask whether a tutor can take a lesson at a given time
//! lessons check -s state.json --tutor <UUID> \
//!   --start 2026-03-04T10:00:00 --end 2026-03-04T11:00:00
//!
//! # Send due reminders (logged, not delivered) and record them
//! lessons remind -s state.json --now 2026-03-03T10:00:00Z -o state.json
//! ```
//!
//! Times without an offset are read in the configured timezone. Logs go to
//! stderr and honor `RUST_LOG`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use lesson_engine::config::{load_config, load_config_from_path};
use lesson_engine::notify::LogNotifier;
use lesson_engine::reminders::ReminderSweep;
use lesson_engine::{
    AvailabilityValidator, ConflictDetector, MemoryStore, RecurringGenerator, Snapshot, Stores,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "lessons",
    version,
    about = "Tutor availability, conflict checks and recurring lesson generation"
)]
struct Cli {
    /// Engine config file (defaults to ./lessons.toml plus LESSONS_* variables)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Materialize upcoming lessons for every active course
    Generate {
        /// State snapshot to read
        #[arg(short, long)]
        state: String,
        /// Reference instant (defaults to now)
        #[arg(long)]
        now: Option<String>,
        /// Where to write the updated snapshot (not written if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Check a tutor's availability and conflicts for a proposed lesson
    Check {
        #[arg(short, long)]
        state: String,
        #[arg(long)]
        tutor: Uuid,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Appointment to ignore when checking conflicts (when moving it)
        #[arg(long)]
        exclude: Option<Uuid>,
    },
    /// Send day-before and short-lead reminders that are due
    Remind {
        #[arg(short, long)]
        state: String,
        #[arg(long)]
        now: Option<String>,
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => load_config_from_path(Path::new(path))
            .with_context(|| format!("Failed to load config: {}", path))?,
        None => load_config().context("Failed to load config")?,
    };
    let tz = config.timezone()?;
    tracing::debug!(timezone = tz.name(), horizon_days = config.horizon_days, "config loaded");

    match cli.command {
        Commands::Generate { state, now, output } => {
            let store = Arc::new(read_state(&state)?);
            let now = parse_instant_or_now(now.as_deref(), tz)?;
            let stores = Stores::shared(store.clone());
            let generator = RecurringGenerator::new(
                stores.courses,
                stores.appointments,
                tz,
                config.horizon_days,
            );

            let report = generator.generate(now).await?;
            println!("Courses processed: {}", report.courses_processed);
            println!("Courses skipped:   {}", report.courses_skipped);
            println!("Created:           {}", report.created);
            println!("Already present:   {}", report.already_present);
            println!("Clashes:           {}", report.clashes);
            for course_id in &report.needs_renewal {
                println!("Needs renewal:     {}", course_id);
            }
            for failure in &report.failures {
                println!("Failed:            {} ({})", failure.course_id, failure.error);
            }

            write_state(output.as_deref(), &store).await?;
        }
        Commands::Check {
            state,
            tutor,
            start,
            end,
            exclude,
        } => {
            let store = Arc::new(read_state(&state)?);
            let start = parse_instant(&start, tz)?;
            let end = parse_instant(&end, tz)?;
            anyhow::ensure!(end > start, "--end must be after --start");

            let available = AvailabilityValidator::new(store.clone(), tz)
                .is_available(tutor, start, end)
                .await?;
            let conflicts = ConflictDetector::new(store.clone())
                .conflicts(tutor, start, end, exclude)
                .await?;

            println!("Availability: {}", if available { "available" } else { "unavailable" });
            if conflicts.is_empty() {
                println!("Conflicts:    none");
            } else {
                for conflict in &conflicts {
                    println!(
                        "Conflicts:    {} ({} min overlap)",
                        conflict.appointment.id, conflict.overlap_minutes
                    );
                }
            }
        }
        Commands::Remind { state, now, output } => {
            let store = Arc::new(read_state(&state)?);
            let now = parse_instant_or_now(now.as_deref(), tz)?;
            let sweep = ReminderSweep::new(
                store.clone(),
                Arc::new(LogNotifier),
                config.reminder.clone(),
                config.external_timeout(),
            );

            let report = sweep.run(now).await?;
            println!("Day-before sent: {}", report.day_before_sent);
            println!("Upcoming sent:   {}", report.upcoming_sent);
            println!("Failed:          {}", report.failed);

            write_state(output.as_deref(), &store).await?;
        }
    }

    Ok(())
}

fn read_state(path: &str) -> Result<MemoryStore> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))?;
    let snapshot: Snapshot = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse state snapshot: {}", path))?;
    MemoryStore::from_snapshot(snapshot)
        .with_context(|| format!("Invalid state snapshot: {}", path))
}

async fn write_state(path: Option<&str>, store: &MemoryStore) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let pretty = serde_json::to_string_pretty(&store.snapshot().await)?;
    std::fs::write(path, pretty).with_context(|| format!("Failed to write file: {}", path))
}

fn parse_instant_or_now(value: Option<&str>, tz: Tz) -> Result<DateTime<Utc>> {
    match value {
        Some(value) => parse_instant(value, tz),
        None => Ok(Utc::now()),
    }
}

/// Parse an instant given as RFC 3339, a naive local datetime, or a bare
/// date (local midnight). Naive forms are read in `tz`.
fn parse_instant(value: &str, tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .with_context(|| format!("Invalid datetime '{}'", value))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{}' does not exist in {}", value, tz.name()))
}
