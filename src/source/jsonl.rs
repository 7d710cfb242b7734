//! Exported event log reader
//!
//! Reads one JSON object per line, in the order the events were appended.
//! Blank lines are ignored and do not take up a position.
//!
//! ```text
//! {"id":"e1","event_type":"OrderPlaced","stream_name":"order-1","recorded_at":1672574400,"data":{"total":10}}
//! {"event_id":"e2","type":"OrderPaid","stream":"order-1","recorded_at":"2023-01-01T12:05:00Z","data_base64":"AAE="}
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{SourceError, SourceResult};
use crate::types::{Payload, RawEvent, SourceTimestamp};

use super::{EventSource, EventStream};

/// Event source backed by a JSON Lines export
#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
}

impl JsonlEventSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the export path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for JsonlEventSource {
    fn read_from(&self, position: u64) -> SourceResult<EventStream<'_>> {
        let file = File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                SourceError::Unavailable(format!("{}: {}", self.path.display(), e))
            }
            _ => SourceError::Io(e),
        })?;

        Ok(Box::new(JsonlReader {
            reader: BufReader::new(file),
            line: Vec::new(),
            next_position: 0,
            start: position,
            finished: false,
        }))
    }

    fn describe(&self) -> String {
        format!("JSONL export {}", self.path.display())
    }
}

struct JsonlReader<R> {
    reader: R,
    line: Vec<u8>,
    next_position: u64,
    start: u64,
    finished: bool,
}

impl<R: BufRead> Iterator for JsonlReader<R> {
    type Item = SourceResult<RawEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(SourceError::Io(e)));
                }
            }
            if self.line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let position = self.next_position;
            self.next_position += 1;
            if position < self.start {
                continue;
            }

            // Invalid UTF-8 rejects this line only
            return Some(match std::str::from_utf8(&self.line) {
                Ok(line) => decode_line(line, position),
                Err(e) => Err(SourceError::Decode {
                    position,
                    message: format!("line is not valid UTF-8: {}", e),
                }),
            });
        }
    }
}

fn decode_line(line: &str, position: u64) -> SourceResult<RawEvent> {
    let exported: ExportedEvent =
        serde_json::from_str(line).map_err(|e| SourceError::Decode {
            position,
            message: e.to_string(),
        })?;
    exported.into_raw(position)
}

/// One line of the export
#[derive(Debug, Deserialize)]
struct ExportedEvent {
    #[serde(alias = "event_id")]
    id: Option<String>,
    #[serde(alias = "type")]
    event_type: Option<String>,
    #[serde(alias = "stream")]
    stream_name: Option<String>,
    recorded_at: Option<SourceTimestamp>,
    data: Option<Value>,
    data_base64: Option<String>,
    metadata: Option<Value>,
    stream_position: Option<u64>,
    commit_position: Option<u64>,
    prepare_position: Option<u64>,
    retry_count: Option<u32>,
    link: Option<String>,
    content_type: Option<String>,
    created: Option<SourceTimestamp>,
}

impl ExportedEvent {
    fn into_raw(self, position: u64) -> SourceResult<RawEvent> {
        let data = match (self.data_base64, self.data) {
            (Some(encoded), _) => {
                let bytes = BASE64.decode(encoded.as_bytes()).map_err(|e| {
                    SourceError::Decode {
                        position,
                        message: format!("invalid data_base64: {}", e),
                    }
                })?;
                Some(Payload::Bytes(bytes))
            }
            (None, Some(Value::String(text))) => Some(Payload::Text(text)),
            (None, Some(value)) => Some(Payload::Json(value)),
            (None, None) => None,
        };

        Ok(RawEvent {
            position,
            id: self.id,
            event_type: self.event_type,
            stream_name: self.stream_name,
            recorded_at: self.recorded_at,
            data,
            metadata: self.metadata,
            stream_position: self.stream_position,
            commit_position: self.commit_position,
            prepare_position: self.prepare_position,
            retry_count: self.retry_count,
            link: self.link,
            content_type: self.content_type,
            created: self.created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_export(dir: &TempDir, lines: &[&str]) -> JsonlEventSource {
        let path = dir.path().join("events.jsonl");
        fs::write(&path, lines.join("\n")).unwrap();
        JsonlEventSource::new(path)
    }

    #[test]
    fn test_reads_events_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_export(
            &temp_dir,
            &[
                r#"{"id":"e1","event_type":"OrderPlaced","stream_name":"order-1","recorded_at":1672574400,"data":{"total":10}}"#,
                r#"{"id":"e2","event_type":"OrderPaid","stream_name":"order-1","recorded_at":1672574500,"data":"paid"}"#,
            ],
        );

        let events: Vec<RawEvent> = source.read_from(0).unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].position, 0);
        assert_eq!(events[0].data, Some(Payload::Json(json!({"total": 10}))));
        assert_eq!(events[1].position, 1);
        assert_eq!(events[1].data, Some(Payload::Text("paid".to_string())));
    }

    #[test]
    fn test_field_aliases_and_rfc3339() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_export(
            &temp_dir,
            &[r#"{"event_id":"e1","type":"OrderPlaced","stream":"order-1","recorded_at":"2023-01-01T12:00:00Z","commit_position":42}"#],
        );

        let event = source.read_from(0).unwrap().next().unwrap().unwrap();
        assert_eq!(event.id.as_deref(), Some("e1"));
        assert_eq!(event.event_type.as_deref(), Some("OrderPlaced"));
        assert_eq!(event.stream_name.as_deref(), Some("order-1"));
        assert_eq!(event.recorded_at.map(|ts| ts.unix_seconds()), Some(1672574400));
        assert_eq!(event.commit_position, Some(42));
    }

    #[test]
    fn test_data_base64_is_decoded() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_export(&temp_dir, &[r#"{"id":"e1","data_base64":"//79"}"#]);

        let event = source.read_from(0).unwrap().next().unwrap().unwrap();
        assert_eq!(event.data, Some(Payload::Bytes(vec![0xff, 0xfe, 0xfd])));
    }

    #[test]
    fn test_bad_lines_are_decode_errors_with_positions() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_export(
            &temp_dir,
            &[
                r#"{"id":"e1"}"#,
                "not json",
                r#"{"id":"e3","data_base64":"***"}"#,
                r#"{"id":"e4"}"#,
            ],
        );

        let results: Vec<_> = source.read_from(0).unwrap().collect();
        assert_eq!(results.len(), 4);
        assert!(matches!(
            results[1],
            Err(SourceError::Decode { position: 1, .. })
        ));
        assert!(matches!(
            results[2],
            Err(SourceError::Decode { position: 2, .. })
        ));
        assert_eq!(results[3].as_ref().unwrap().position, 3);
    }

    #[test]
    fn test_invalid_utf8_line_is_rejected_alone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.jsonl");
        let mut bytes = br#"{"id":"e1"}"#.to_vec();
        bytes.extend_from_slice(b"\n{\"id\":\"e2\",\"event_type\":\"Order\xffPlaced\"}\n");
        bytes.extend_from_slice(br#"{"id":"e3"}"#);
        fs::write(&path, bytes).unwrap();
        let source = JsonlEventSource::new(path);

        let results: Vec<_> = source.read_from(0).unwrap().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().position, 0);
        match &results[1] {
            Err(err @ SourceError::Decode { position: 1, .. }) => assert!(!err.is_fatal()),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert_eq!(results[2].as_ref().unwrap().id.as_deref(), Some("e3"));
        assert_eq!(results[2].as_ref().unwrap().position, 2);

        let resumed: Vec<_> = source.read_from(1).unwrap().collect();
        assert_eq!(resumed.len(), 2);
        assert!(matches!(resumed[0], Err(SourceError::Decode { position: 1, .. })));
    }

    #[test]
    fn test_blank_lines_take_no_position() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_export(&temp_dir, &[r#"{"id":"e1"}"#, "", "   ", r#"{"id":"e2"}"#]);

        let positions: Vec<u64> = source
            .read_from(0)
            .unwrap()
            .map(|e| e.unwrap().position)
            .collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[test]
    fn test_read_from_skips_earlier_positions() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_export(
            &temp_dir,
            &[r#"{"id":"e1"}"#, r#"{"id":"e2"}"#, r#"{"id":"e3"}"#],
        );

        let ids: Vec<String> = source
            .read_from(2)
            .unwrap()
            .map(|e| e.unwrap().id.unwrap())
            .collect();
        assert_eq!(ids, vec!["e3"]);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let source = JsonlEventSource::new(temp_dir.path().join("missing.jsonl"));

        match source.read_from(0) {
            Err(err) => {
                assert!(matches!(err, SourceError::Unavailable(_)));
                assert!(err.is_fatal());
            }
            Ok(_) => panic!("expected missing export to be unavailable"),
        };
    }
}
