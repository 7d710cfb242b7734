//! SQLite implementation of the destination store

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::config::ConversionConfig;
use crate::error::{StoreError, StoreResult};
use crate::types::{BatchOutcome, DestinationStats, EventRecord};
use crate::utils::current_timestamp;

use super::metadata::TOOL_VERSION;
use super::schema::{
    CREATE_EVENTS_TABLE, CREATE_METADATA_TABLE, EVENT_INDEXES, INSERT_EVENT, SELECT_EVENT_INDEXES,
    SELECT_METADATA, UPSERT_METADATA,
};
use super::TargetStore;

/// Destination database holding `events` and `conversion_metadata`
pub struct SqliteEventStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteEventStore {
    /// Open or create the database at `config.db_path`
    ///
    /// Parent directories are created as needed. Open and pragma failures
    /// are reported as `StoreError::Schema`.
    pub fn open(config: &ConversionConfig) -> StoreResult<Self> {
        let path = config.db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Schema(format!("cannot open {}: {}", path.display(), e))
        })?;
        apply_pragmas(&conn, config.busy_timeout)
            .map_err(|e| StoreError::Schema(format!("cannot configure database: {}", e)))?;

        info!(path = %path.display(), "opened destination database");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Schema(format!("cannot open in-memory database: {}", e)))?;
        apply_pragmas(&conn, Duration::from_secs(30))
            .map_err(|e| StoreError::Schema(format!("cannot configure database: {}", e)))?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Event indexes currently present, sorted by name
    pub fn index_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(SELECT_EVENT_INDEXES)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Close the connection, surfacing any error instead of ignoring it on drop
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, e)| StoreError::from(e))
    }
}

impl TargetStore for SqliteEventStore {
    fn initialize(&mut self, skip_indexes: bool) -> StoreResult<()> {
        init_schema(&mut self.conn, skip_indexes)
            .map_err(|e| StoreError::Schema(format!("cannot create schema: {}", e)))?;
        info!(indexes = !skip_indexes, "destination schema ready");
        Ok(())
    }

    fn create_indexes(&mut self) -> StoreResult<()> {
        let start = Instant::now();
        let tx = self.conn.transaction()?;
        for (name, ddl) in EVENT_INDEXES {
            debug!(index = name, "creating index");
            tx.execute_batch(ddl)?;
        }
        tx.commit()?;
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "indexes built");
        Ok(())
    }

    fn write_batch(&mut self, records: &[EventRecord]) -> StoreResult<BatchOutcome> {
        let now = current_timestamp();
        let mut outcome = BatchOutcome::default();

        // Dropping `tx` on an early return rolls the batch back.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare_cached(INSERT_EVENT)?;
            for record in records {
                let changed = stmt.execute(params![
                    record.id,
                    record.recorded_at,
                    record.event_type,
                    record.stream_name,
                    record.data,
                    record.metadata,
                    record.processed_at.unwrap_or(now),
                ])?;
                if changed == 0 {
                    debug!(event_id = %record.id, "duplicate id, keeping stored row");
                    outcome.skipped += 1;
                } else {
                    outcome.inserted += 1;
                }
            }
        }
        tx.commit()?;

        Ok(outcome)
    }

    fn update_metadata_entries(&mut self, entries: &[(&str, String)]) -> StoreResult<()> {
        let now = current_timestamp();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_METADATA)?;
            for (key, value) in entries {
                stmt.execute(params![key, value, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn metadata(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(SELECT_METADATA, params![key], |row| row.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn event_count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn stats(&self) -> StoreResult<DestinationStats> {
        let (total, earliest, latest) = self.conn.query_row(
            "SELECT COUNT(*), MIN(recorded_at), MAX(recorded_at) FROM events",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            },
        )?;
        // Committed pages stay in the -wal file until SQLite checkpoints them
        let database_size = file_size(&self.path) + file_size(&wal_path(&self.path));

        Ok(DestinationStats {
            total_events: total.max(0) as u64,
            earliest_recorded_at: earliest,
            latest_recorded_at: latest,
            database_size,
        })
    }
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn wal_path(path: &Path) -> PathBuf {
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    PathBuf::from(wal)
}

fn apply_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", 10000)?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

fn init_schema(conn: &mut Connection, skip_indexes: bool) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(CREATE_EVENTS_TABLE)?;
    tx.execute_batch(CREATE_METADATA_TABLE)?;
    if !skip_indexes {
        for (_, ddl) in EVENT_INDEXES {
            tx.execute_batch(ddl)?;
        }
    }
    tx.execute(
        UPSERT_METADATA,
        params![TOOL_VERSION, crate::VERSION, current_timestamp()],
    )?;
    tx.commit()
}
