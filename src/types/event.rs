//! Raw events as yielded by an event source
//!
//! A `RawEvent` is what the source hands over before any validation: every
//! field is optional because the event log makes no promises about which
//! attributes are present. The pipeline turns it into an `EventRecord`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp in whichever representation the source uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceTimestamp {
    /// Seconds since the unix epoch (may be zero or negative in malformed logs)
    Seconds(i64),
    /// RFC 3339 date-time
    DateTime(DateTime<Utc>),
}

impl SourceTimestamp {
    /// Coerce to whole seconds since the unix epoch
    pub fn unix_seconds(&self) -> i64 {
        match self {
            SourceTimestamp::Seconds(secs) => *secs,
            SourceTimestamp::DateTime(dt) => dt.timestamp(),
        }
    }
}

impl From<DateTime<Utc>> for SourceTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        SourceTimestamp::DateTime(dt)
    }
}

impl From<i64> for SourceTimestamp {
    fn from(secs: i64) -> Self {
        SourceTimestamp::Seconds(secs)
    }
}

/// Event payload as provided by the source
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Already textual (usually serialized JSON)
    Text(String),
    /// Opaque bytes; stored as text if they are UTF-8
    Bytes(Vec<u8>),
    /// Structured data, serialized with serde_json before storage
    Json(serde_json::Value),
}

/// One event read from the source log, before validation
///
/// `position` is assigned by the reader: the event's ordinal in the log,
/// starting at 0. It is what checkpoints are made of.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    pub position: u64,
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub stream_name: Option<String>,
    pub recorded_at: Option<SourceTimestamp>,
    pub data: Option<Payload>,
    /// User metadata attached to the event in the source system
    pub metadata: Option<serde_json::Value>,
    pub stream_position: Option<u64>,
    pub commit_position: Option<u64>,
    pub prepare_position: Option<u64>,
    pub retry_count: Option<u32>,
    pub link: Option<String>,
    pub content_type: Option<String>,
    pub created: Option<SourceTimestamp>,
}

impl RawEvent {
    /// Create a raw event with the four required attributes set
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        stream_name: impl Into<String>,
        recorded_at: i64,
    ) -> Self {
        Self {
            id: Some(id.into()),
            event_type: Some(event_type.into()),
            stream_name: Some(stream_name.into()),
            recorded_at: Some(SourceTimestamp::Seconds(recorded_at)),
            ..Default::default()
        }
    }

    /// Set the payload
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the user metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the position in the source log
    pub fn at_position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    /// Identifier for log messages, even when the id is missing
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<missing id>")
    }
}
