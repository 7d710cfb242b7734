//! Error types for the converter
//!
//! Errors are layered the same way the pipeline is:
//! - `ValidationError`: one raw record could not become an `EventRecord`
//! - `SourceError`: the event log could not be read
//! - `StoreError`: the destination rejected a write or could not be opened
//! - `ConverterError`: what a run returns when it cannot finish

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::types::ConversionStats;

/// Result type for record validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type for source reads
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for destination operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for a conversion run
pub type ConverterResult<T> = Result<T, ConverterError>;

/// Why a single raw record was rejected before reaching the destination
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("recorded_at must be a positive unix timestamp, got {0}")]
    InvalidTimestamp(i64),

    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("payload too large: {size} bytes > {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("cannot serialize {field}: {message}")]
    Serialization { field: &'static str, message: String },
}

/// Errors raised while reading the event log
#[derive(Error, Debug)]
pub enum SourceError {
    /// The event log cannot be reached (connection lost, file missing, stalled read)
    #[error("event source unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error reading event source: {0}")]
    Io(#[from] std::io::Error),

    /// One record could not be decoded; the rest of the log is still readable
    #[error("undecodable record at position {position}: {message}")]
    Decode { position: u64, message: String },
}

impl SourceError {
    /// Whether the run has to stop, as opposed to rejecting one record
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Decode { .. })
    }
}

/// Errors raised by the destination store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The schema could not be created or the database could not be opened
    #[error("schema error: {0}")]
    Schema(String),

    /// A constraint other than the primary key rejected a row (e.g. a CHECK)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Busy, locked, I/O or disk-full failure; the same batch may succeed later
    #[error("transient storage error: {0}")]
    Transient(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same transaction can succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(err, msg) = &e {
            let detail = msg.clone().unwrap_or_else(|| err.to_string());
            match err.code {
                ErrorCode::ConstraintViolation => return StoreError::Constraint(detail),
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull
                | ErrorCode::OutOfMemory => return StoreError::Transient(detail),
                _ => {}
            }
        }
        StoreError::Sqlite(e)
    }
}

/// Why a conversion run stopped without completing
///
/// Fatal variants carry the last committed checkpoint and the counters
/// accumulated so far, so a caller can report progress and resume.
#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("destination could not be initialized: {0}")]
    Schema(#[source] StoreError),

    #[error("event source failed (resume from position {checkpoint}): {source}")]
    SourceUnavailable {
        #[source]
        source: SourceError,
        checkpoint: u64,
        stats: Box<ConversionStats>,
    },

    #[error(
        "batch at position {first_position} failed after {attempts} attempt(s) \
         (resume from position {checkpoint}): {source}"
    )]
    BatchFailed {
        #[source]
        source: StoreError,
        first_position: u64,
        attempts: u32,
        checkpoint: u64,
        stats: Box<ConversionStats>,
    },

    /// Saving progress or finalizing the destination failed after batches were committed
    #[error("destination error (resume from position {checkpoint}): {source}")]
    Destination {
        #[source]
        source: StoreError,
        checkpoint: u64,
        stats: Box<ConversionStats>,
    },
}

impl ConverterError {
    /// Last durably committed source position, when the run got that far
    pub fn checkpoint(&self) -> Option<u64> {
        match self {
            ConverterError::SourceUnavailable { checkpoint, .. }
            | ConverterError::BatchFailed { checkpoint, .. }
            | ConverterError::Destination { checkpoint, .. } => Some(*checkpoint),
            _ => None,
        }
    }

    /// Counters accumulated before the failure
    pub fn stats(&self) -> Option<&ConversionStats> {
        match self {
            ConverterError::SourceUnavailable { stats, .. }
            | ConverterError::BatchFailed { stats, .. }
            | ConverterError::Destination { stats, .. } => Some(stats),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), Some("boom".to_string()))
    }

    #[test]
    fn test_constraint_failures_are_permanent() {
        let err = StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT));
        assert!(matches!(err, StoreError::Constraint(ref msg) if msg == "boom"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_busy_and_io_failures_are_transient() {
        assert!(StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_BUSY)).is_transient());
        assert!(StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED)).is_transient());
        assert!(StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_IOERR)).is_transient());
        assert!(StoreError::from(sqlite_failure(rusqlite::ffi::SQLITE_FULL)).is_transient());
    }

    #[test]
    fn test_decode_errors_are_not_fatal() {
        let decode = SourceError::Decode {
            position: 3,
            message: "bad json".to_string(),
        };
        assert!(!decode.is_fatal());
        assert!(SourceError::Unavailable("gone".to_string()).is_fatal());
    }

    #[test]
    fn test_converter_error_exposes_checkpoint() {
        let err = ConverterError::SourceUnavailable {
            source: SourceError::Unavailable("connection reset".to_string()),
            checkpoint: 42,
            stats: Box::default(),
        };
        assert_eq!(err.checkpoint(), Some(42));
        assert!(err.stats().is_some());
        assert!(err.to_string().contains("resume from position 42"));

        assert_eq!(ConverterError::Config("x".to_string()).checkpoint(), None);
    }
}
