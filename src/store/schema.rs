//! Destination schema
//!
//! The DDL is applied with `IF NOT EXISTS` so re-running the converter
//! against an existing database is a no-op.

/// Events table, one row per source event
pub const CREATE_EVENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    recorded_at INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    stream_name TEXT NOT NULL,
    data TEXT,
    eventstore_metadata TEXT,
    processed_at INTEGER DEFAULT (strftime('%s', 'now')),

    CHECK (recorded_at > 0),
    CHECK (length(event_type) > 0),
    CHECK (length(stream_name) > 0)
)";

/// Run-level key/value facts
pub const CREATE_METADATA_TABLE: &str = "
CREATE TABLE IF NOT EXISTS conversion_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
)";

/// Secondary indexes on `events`, as (name, DDL)
pub const EVENT_INDEXES: [(&str, &str); 4] = [
    (
        "idx_events_recorded_at",
        "CREATE INDEX IF NOT EXISTS idx_events_recorded_at ON events(recorded_at)",
    ),
    (
        "idx_events_type",
        "CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type)",
    ),
    (
        "idx_events_stream",
        "CREATE INDEX IF NOT EXISTS idx_events_stream ON events(stream_name)",
    ),
    (
        "idx_events_processed_at",
        "CREATE INDEX IF NOT EXISTS idx_events_processed_at ON events(processed_at)",
    ),
];

/// First write wins: a primary-key conflict leaves the stored row untouched.
///
/// `ON CONFLICT(id)` only covers the primary key, so CHECK violations still
/// abort the statement.
pub const INSERT_EVENT: &str = "
INSERT INTO events
    (id, recorded_at, event_type, stream_name, data, eventstore_metadata, processed_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(id) DO NOTHING";

pub const UPSERT_METADATA: &str = "
INSERT INTO conversion_metadata (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

pub const SELECT_METADATA: &str = "SELECT value FROM conversion_metadata WHERE key = ?1";

pub const SELECT_EVENT_INDEXES: &str = "
SELECT name FROM sqlite_master
WHERE type = 'index' AND tbl_name = 'events' AND name LIKE 'idx_events_%'
ORDER BY name";

/// Names of the indexes `create_indexes` builds, sorted
pub fn event_index_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = EVENT_INDEXES.iter().map(|(name, _)| *name).collect();
    names.sort_unstable();
    names
}
