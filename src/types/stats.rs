//! Conversion statistics
//!
//! Provides:
//! - `BatchOutcome`: what one committed transaction did
//! - `DestinationStats`: what the destination database holds
//! - `ConversionStats`: the counters of one run

use std::time::Duration;

/// Result of writing one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows added to `events`
    pub inserted: usize,
    /// Records whose id was already present
    pub skipped: usize,
}

impl BatchOutcome {
    /// Records presented to the store
    pub fn total(&self) -> usize {
        self.inserted + self.skipped
    }
}

/// Statistics about the destination database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationStats {
    /// Rows in the `events` table
    pub total_events: u64,
    /// Smallest `recorded_at`, if any rows exist
    pub earliest_recorded_at: Option<i64>,
    /// Largest `recorded_at`, if any rows exist
    pub latest_recorded_at: Option<i64>,
    /// Size of the database file in bytes
    pub database_size: u64,
}

impl DestinationStats {
    /// `database_size` in binary units, e.g. `2.00 KB`
    pub fn human_size(&self) -> String {
        const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

        if self.database_size < 1024 {
            return format!("{} B", self.database_size);
        }
        let mut value = self.database_size as f64 / 1024.0;
        let mut unit = 0;
        while value >= 1024.0 && unit + 1 < UNITS.len() {
            value /= 1024.0;
            unit += 1;
        }
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Counters for one conversion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionStats {
    /// Records pulled from the source (including undecodable ones)
    pub events_read: u64,
    pub inserted: u64,
    /// Duplicates skipped by the first-write-wins policy
    pub skipped: u64,
    /// Records that failed validation or could not be decoded
    pub rejected: u64,
    /// Records in batches given up under the skip policy
    pub failed: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
    /// Source position the run started reading at
    pub start_position: u64,
    /// Next source position to read after the last committed batch
    pub checkpoint: u64,
    pub elapsed: Duration,
    /// The run stopped early on an external interrupt
    pub interrupted: bool,
    /// Deferred indexes were built during finalization
    pub indexes_built: bool,
    /// Destination totals, collected when the run finishes
    pub destination: Option<DestinationStats>,
}

impl ConversionStats {
    /// Records that reached the store
    pub fn events_written(&self) -> u64 {
        self.inserted + self.skipped
    }

    /// Throughput over records read from the source
    pub fn events_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.events_read as f64 / secs
        } else {
            0.0
        }
    }

    /// Fold one committed batch into the counters
    pub fn record_batch(&mut self, outcome: BatchOutcome) {
        self.inserted += outcome.inserted as u64;
        self.skipped += outcome.skipped as u64;
        self.batches_committed += 1;
    }
}
