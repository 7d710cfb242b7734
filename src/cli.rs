//! Command-line interface
//!
//! Flags map one-to-one onto `ConversionConfig`. The source and destination
//! paths can also come from `EVENTSTORE_SOURCE` and `EVENTSTORE_DB`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    BatchFailurePolicy, ConversionConfig, DEFAULT_BATCH_SIZE, DEFAULT_COMMIT_FREQUENCY,
    DEFAULT_DB_PATH, DEFAULT_MAX_DATA_SIZE,
};
use crate::types::ConversionStats;
use crate::utils::format_timestamp;

/// Convert an exported EventStore log into a SQLite database
#[derive(Parser, Debug)]
#[command(name = "eventstore-converter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Exported event log (JSON Lines, one event per line)
    #[arg(short, long, env = "EVENTSTORE_SOURCE")]
    pub source: PathBuf,

    /// Destination SQLite database
    #[arg(short, long, env = "EVENTSTORE_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Events per transaction
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Batches between persisted checkpoints
    #[arg(long, default_value_t = DEFAULT_COMMIT_FREQUENCY)]
    pub commit_frequency: usize,

    /// Write events without checking required fields
    #[arg(long)]
    pub skip_validation: bool,

    /// Do not create indexes before importing
    #[arg(long)]
    pub skip_indexes: bool,

    /// With --skip-indexes, leave the database without indexes
    #[arg(long)]
    pub no_deferred_indexes: bool,

    /// Continue from the checkpoint stored in the database
    #[arg(short, long)]
    pub resume: bool,

    /// Retries for a batch that hit a busy or locked database
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Delay before the first retry, doubled on each further retry
    #[arg(long, default_value_t = 100)]
    pub retry_backoff_ms: u64,

    /// What to do with a batch that keeps failing
    #[arg(long, value_enum, default_value_t = BatchFailurePolicy::Abort)]
    pub on_batch_failure: BatchFailurePolicy,

    /// Seconds a write waits on a locked database
    #[arg(long, default_value_t = 30)]
    pub busy_timeout_secs: u64,

    /// Largest accepted payload in bytes (validation only)
    #[arg(long, default_value_t = DEFAULT_MAX_DATA_SIZE)]
    pub max_data_size: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Build the run configuration from the parsed flags
    pub fn to_config(&self) -> ConversionConfig {
        ConversionConfig::new(&self.db)
            .with_batch_size(self.batch_size)
            .with_commit_frequency(self.commit_frequency)
            .with_validation(!self.skip_validation)
            .with_skip_indexes(self.skip_indexes)
            .with_deferred_index_build(!self.no_deferred_indexes)
            .with_resume(self.resume)
            .with_retries(
                self.max_retries,
                Duration::from_millis(self.retry_backoff_ms),
            )
            .with_batch_failure_policy(self.on_batch_failure)
            .with_busy_timeout(Duration::from_secs(self.busy_timeout_secs))
            .with_max_data_size(self.max_data_size)
    }

    /// Default filter directive for the subscriber
    pub fn log_filter(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

/// Human-readable report of a finished (or stopped) run
pub fn format_summary(stats: &ConversionStats) -> String {
    let title = if stats.interrupted {
        "CONVERSION INTERRUPTED (rerun with --resume to continue)"
    } else {
        "CONVERSION COMPLETED"
    };
    let rule = "=".repeat(50);

    let mut lines = vec![
        rule.clone(),
        title.to_string(),
        rule,
        format!("Events read:     {}", stats.events_read),
        format!("Inserted:        {}", stats.inserted),
        format!("Skipped:         {}", stats.skipped),
        format!("Rejected:        {}", stats.rejected),
        format!("Failed:          {}", stats.failed),
        format!(
            "Batches:         {} committed, {} failed",
            stats.batches_committed, stats.batches_failed
        ),
        format!(
            "Positions:       {} -> {}",
            stats.start_position, stats.checkpoint
        ),
        format!("Duration:        {:.2} seconds", stats.elapsed.as_secs_f64()),
        format!("Rate:            {:.1} events/second", stats.events_per_second()),
    ];
    if stats.indexes_built {
        lines.push("Indexes:         built after import".to_string());
    }

    if let Some(destination) = &stats.destination {
        lines.push(format!("Total events:    {}", destination.total_events));
        lines.push(format!("Database size:   {}", destination.human_size()));
        if let (Some(earliest), Some(latest)) = (
            destination.earliest_recorded_at,
            destination.latest_recorded_at,
        ) {
            lines.push(format!(
                "Recorded:        {} .. {}",
                format_timestamp(earliest),
                format_timestamp(latest)
            ));
        }
    }

    let mut summary = lines.join("\n");
    summary.push('\n');
    summary
}
