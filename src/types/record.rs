//! Event records ready for the destination
//!
//! `EventRecord::from_raw` is the single transform between the source model
//! and the `events` table. It is a pure function of one raw event and the
//! configuration.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use tracing::warn;

use crate::config::ConversionConfig;
use crate::error::{ValidationError, ValidationResult};
use crate::types::{Payload, RawEvent, SourceTimestamp};
use crate::validation::{check_payload_size, require_positive_timestamp, require_text};

/// One validated event, shaped like a row of the `events` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    /// Seconds since the unix epoch
    pub recorded_at: i64,
    pub event_type: String,
    pub stream_name: String,
    pub data: Option<String>,
    /// Serialized source-side metadata (`eventstore_metadata` column)
    pub metadata: Option<String>,
    /// Write time; the store fills it in when `None`
    pub processed_at: Option<i64>,
}

/// Positional facts and user metadata, serialized into one JSON object
#[derive(Serialize)]
struct SourceMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prepare_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Value>,
}

impl SourceMetadata<'_> {
    fn is_empty(&self) -> bool {
        self.stream_position.is_none()
            && self.commit_position.is_none()
            && self.prepare_position.is_none()
            && self.retry_count.is_none()
            && self.link.is_none()
            && self.content_type.is_none()
            && self.created.is_none()
            && self.metadata.is_none()
    }
}

impl EventRecord {
    /// Create a record from already-trusted values
    pub fn new(
        id: impl Into<String>,
        recorded_at: i64,
        event_type: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            recorded_at,
            event_type: event_type.into(),
            stream_name: stream_name.into(),
            data: None,
            metadata: None,
            processed_at: None,
        }
    }

    /// Set the payload text
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Transform a raw event, validating it unless validation is disabled
    ///
    /// With validation disabled nothing is rejected here: missing strings
    /// become empty and a missing timestamp becomes 0, so malformed events
    /// fail later on the destination's constraints.
    pub fn from_raw(raw: RawEvent, config: &ConversionConfig) -> ValidationResult<Self> {
        let validate = config.validate_data;
        let metadata = serialize_metadata(&raw, validate)?;

        let (id, recorded_at, event_type, stream_name) = if validate {
            (
                require_text("id", raw.id)?,
                require_positive_timestamp(raw.recorded_at)?,
                require_text("event_type", raw.event_type)?,
                require_text("stream_name", raw.stream_name)?,
            )
        } else {
            (
                raw.id.unwrap_or_default(),
                raw.recorded_at.map(|ts| ts.unix_seconds()).unwrap_or(0),
                raw.event_type.unwrap_or_default(),
                raw.stream_name.unwrap_or_default(),
            )
        };

        let data = match raw.data {
            Some(payload) => encode_payload(&id, payload, validate)?,
            None => None,
        };
        if validate {
            if let Some(text) = &data {
                check_payload_size(text, config.max_data_size)?;
            }
        }

        Ok(Self {
            id,
            recorded_at,
            event_type,
            stream_name,
            data,
            metadata,
            processed_at: None,
        })
    }
}

/// Turn a payload into the text stored in the `data` column
fn encode_payload(id: &str, payload: Payload, validate: bool) -> ValidationResult<Option<String>> {
    match payload {
        Payload::Text(text) => Ok(Some(text)),
        Payload::Json(value) => match serde_json::to_string(&value) {
            Ok(text) => Ok(Some(text)),
            Err(e) if validate => Err(ValidationError::Serialization {
                field: "data",
                message: e.to_string(),
            }),
            Err(e) => {
                warn!(event_id = %id, error = %e, "dropping non-serializable payload");
                Ok(None)
            }
        },
        Payload::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Ok(Some(text)),
            Err(e) if validate => Err(ValidationError::InvalidUtf8(e.utf8_error().to_string())),
            Err(e) => {
                warn!(event_id = %id, "storing non-UTF-8 payload as base64");
                Ok(Some(BASE64.encode(e.into_bytes())))
            }
        },
    }
}

/// Serialize positional facts and user metadata, `None` when there are none
fn serialize_metadata(raw: &RawEvent, validate: bool) -> ValidationResult<Option<String>> {
    let meta = SourceMetadata {
        stream_position: raw.stream_position,
        commit_position: raw.commit_position,
        prepare_position: raw.prepare_position,
        retry_count: raw.retry_count,
        link: raw.link.as_deref(),
        content_type: raw.content_type.as_deref(),
        created: raw.created.as_ref().map(SourceTimestamp::unix_seconds),
        metadata: raw.metadata.as_ref(),
    };
    if meta.is_empty() {
        return Ok(None);
    }

    match serde_json::to_string(&meta) {
        Ok(json) => Ok(Some(json)),
        Err(e) if validate => Err(ValidationError::Serialization {
            field: "metadata",
            message: e.to_string(),
        }),
        Err(e) => {
            warn!(event_id = %raw.display_id(), error = %e, "dropping non-serializable metadata");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn validating() -> ConversionConfig {
        ConversionConfig::default()
    }

    fn trusting() -> ConversionConfig {
        ConversionConfig::default().with_validation(false)
    }

    #[test]
    fn test_valid_event_creation() {
        let raw = RawEvent::new("e1", "TestEvent", "test-stream", 1672574400)
            .with_data(Payload::Text("{\"test\": \"data\"}".to_string()));

        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        assert_eq!(record.id, "e1");
        assert_eq!(record.recorded_at, 1672574400);
        assert_eq!(record.event_type, "TestEvent");
        assert_eq!(record.stream_name, "test-stream");
        assert_eq!(record.data.as_deref(), Some("{\"test\": \"data\"}"));
        assert!(record.metadata.is_none());
        assert!(record.processed_at.is_none());
    }

    #[test]
    fn test_event_with_no_data() {
        let raw = RawEvent::new("e1", "TestEvent", "s", 1);
        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        assert!(record.data.is_none());
    }

    #[test]
    fn test_datetime_recorded_at_is_coerced() {
        let mut raw = RawEvent::new("e1", "TestEvent", "s", 0);
        raw.recorded_at = Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap().into());
        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        assert_eq!(record.recorded_at, 1672574400);
    }

    #[test]
    fn test_json_payload_is_serialized() {
        let raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_data(Payload::Json(json!({"key": "value", "n": 1})));
        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        assert_eq!(record.data.as_deref(), Some("{\"key\":\"value\",\"n\":1}"));

        let raw = RawEvent::new("e2", "TestEvent", "s", 1)
            .with_data(Payload::Json(json!([1, 2, 3])));
        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        assert_eq!(record.data.as_deref(), Some("[1,2,3]"));
    }

    #[test]
    fn test_utf8_bytes_become_text() {
        let raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_data(Payload::Bytes(b"{\"a\":1}".to_vec()));
        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        assert_eq!(record.data.as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_invalid_utf8_rejected_when_validating() {
        let raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_data(Payload::Bytes(vec![0xff, 0xfe, 0xfd]));
        let err = EventRecord::from_raw(raw, &validating()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidUtf8(_)));
    }

    #[test]
    fn test_invalid_utf8_base64_encoded_without_validation() {
        let raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_data(Payload::Bytes(vec![0xff, 0xfe, 0xfd]));
        let record = EventRecord::from_raw(raw, &trusting()).unwrap();
        assert_eq!(record.data.as_deref(), Some("//79"));
        assert_eq!(BASE64.decode("//79").unwrap(), vec![0xff, 0xfe, 0xfd]);
    }

    #[test]
    fn test_data_size_limit() {
        let config = validating().with_max_data_size(8);
        let raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_data(Payload::Text("x".repeat(9)));
        let err = EventRecord::from_raw(raw.clone(), &config).unwrap_err();
        assert_eq!(err, ValidationError::PayloadTooLarge { size: 9, limit: 8 });

        let config = config.with_validation(false);
        assert!(EventRecord::from_raw(raw, &config).is_ok());
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let mut raw = RawEvent::new("e1", "TestEvent", "s", 1);
        raw.event_type = None;
        assert_eq!(
            EventRecord::from_raw(raw, &validating()),
            Err(ValidationError::MissingField("event_type"))
        );

        let mut raw = RawEvent::new("", "TestEvent", "s", 1);
        raw.stream_name = None;
        assert_eq!(
            EventRecord::from_raw(raw, &validating()),
            Err(ValidationError::EmptyField("id"))
        );
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let raw = RawEvent::new("bad", "TestEvent", "s", -5);
        assert_eq!(
            EventRecord::from_raw(raw, &validating()),
            Err(ValidationError::InvalidTimestamp(-5))
        );
    }

    #[test]
    fn test_malformed_event_passes_through_without_validation() {
        let raw = RawEvent {
            recorded_at: Some(SourceTimestamp::Seconds(-5)),
            ..Default::default()
        };
        let record = EventRecord::from_raw(raw, &trusting()).unwrap();
        assert_eq!(record.id, "");
        assert_eq!(record.recorded_at, -5);
        assert_eq!(record.event_type, "");
        assert_eq!(record.stream_name, "");
    }

    #[test]
    fn test_metadata_serialization() {
        let mut raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_metadata(json!({"correlation_id": "abc"}));
        raw.stream_position = Some(1);
        raw.commit_position = Some(100);
        raw.prepare_position = Some(99);
        raw.retry_count = Some(0);
        raw.content_type = Some("application/json".to_string());
        raw.created = Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap().into());

        let record = EventRecord::from_raw(raw, &validating()).unwrap();
        let meta: serde_json::Value =
            serde_json::from_str(record.metadata.as_deref().unwrap()).unwrap();

        assert_eq!(meta["stream_position"], 1);
        assert_eq!(meta["commit_position"], 100);
        assert_eq!(meta["prepare_position"], 99);
        assert_eq!(meta["retry_count"], 0);
        assert_eq!(meta["content_type"], "application/json");
        assert_eq!(meta["created"], 1672574400);
        assert_eq!(meta["metadata"]["correlation_id"], "abc");
        assert!(meta.get("link").is_none());
    }

    #[test]
    fn test_metadata_is_deterministic() {
        let mut raw = RawEvent::new("e1", "TestEvent", "s", 1)
            .with_metadata(json!({"b": 2, "a": 1}));
        raw.commit_position = Some(5);

        let first = EventRecord::from_raw(raw.clone(), &validating()).unwrap();
        let second = EventRecord::from_raw(raw, &validating()).unwrap();
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(
            first.metadata.as_deref(),
            Some("{\"commit_position\":5,\"metadata\":{\"a\":1,\"b\":2}}")
        );
    }
}
