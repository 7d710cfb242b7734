//! Destination store
//!
//! The store exclusively owns the destination schema and every write to it.
//! The converter talks to it through `TargetStore`, which keeps the
//! pipeline independent of SQLite and lets tests inject failing stores.
//!
//! ```text
//! ┌───────────┐  write_batch   ┌────────────────────┐   one transaction
//! │ Converter │───────────────►│ SqliteEventStore   │──► per batch
//! └───────────┘  metadata      │ events             │
//!                ─────────────►│ conversion_metadata│
//!                              └────────────────────┘
//! ```

pub mod metadata;
pub mod schema;
mod sqlite;

pub use metadata::RunStatus;
pub use sqlite::SqliteEventStore;

use crate::error::{StoreError, StoreResult};
use crate::types::{BatchOutcome, DestinationStats, EventRecord};

/// Operations the converter needs from a destination
pub trait TargetStore {
    /// Create tables (and indexes unless `skip_indexes`) if absent
    fn initialize(&mut self, skip_indexes: bool) -> StoreResult<()>;

    /// Build the secondary indexes; idempotent
    fn create_indexes(&mut self) -> StoreResult<()>;

    /// Write all records in one transaction
    ///
    /// A record whose id already exists is skipped. Any other failure rolls
    /// the whole batch back.
    fn write_batch(&mut self, records: &[EventRecord]) -> StoreResult<BatchOutcome>;

    /// Upsert several metadata entries in one transaction
    fn update_metadata_entries(&mut self, entries: &[(&str, String)]) -> StoreResult<()>;

    fn metadata(&self, key: &str) -> StoreResult<Option<String>>;

    /// Rows currently in `events`
    fn event_count(&self) -> StoreResult<u64>;

    fn stats(&self) -> StoreResult<DestinationStats>;

    fn update_metadata(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.update_metadata_entries(&[(key, value.to_string())])
    }

    /// Next source position to read, if a run ever committed one
    fn checkpoint(&self) -> StoreResult<Option<u64>> {
        read_counter(self, metadata::CHECKPOINT)
    }

    /// Stored `total_events` counter, as of the last persisted checkpoint
    fn total_events(&self) -> StoreResult<u64> {
        Ok(read_counter(self, metadata::TOTAL_EVENTS)?.unwrap_or(0))
    }
}

fn read_counter<S: TargetStore + ?Sized>(store: &S, key: &str) -> StoreResult<Option<u64>> {
    match store.metadata(key)? {
        Some(value) => value.parse::<u64>().map(Some).map_err(|_| {
            StoreError::Schema(format!("metadata `{}` is not a number: {:?}", key, value))
        }),
        None => Ok(None),
    }
}
