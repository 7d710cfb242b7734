//! EventStore to SQLite converter
//!
//! Streams an append-only event log into a SQLite database for analytics
//! and ad-hoc querying. The conversion is batched, resumable and tolerant
//! of partial failures.
//!
//! # Features
//!
//! - **Batched writes**: one transaction per batch, duplicates skipped (first write wins)
//! - **Resumable**: checkpoints persisted every `commit_frequency` batches
//! - **Validation**: malformed events are rejected one by one, never the whole batch
//! - **Retries**: busy or locked databases are retried with exponential backoff
//! - **Graceful shutdown**: Ctrl+C finishes the in-flight batch first
//!
//! # Modules
//!
//! - `types`: Raw events, validated records and run statistics
//! - `validation`: Required-field and payload rules
//! - `source`: Event log readers
//! - `store`: SQLite destination and its schema
//! - `converter`: The batching pipeline
//! - `config`, `error`, `exit_codes`, `cli`: Ambient plumbing
//!
//! # Example
//!
//! ```no_run
//! use eventstore_sqlite::{ConversionConfig, Converter, InMemoryEventSource, RawEvent};
//!
//! let source = InMemoryEventSource::new(vec![
//!     RawEvent::new("e1", "OrderPlaced", "order-1", 1672574400),
//!     RawEvent::new("e2", "OrderPaid", "order-1", 1672574460),
//! ]);
//!
//! let config = ConversionConfig::new("eventstore.db").with_batch_size(1000);
//! let mut converter = Converter::open(config)?;
//! let stats = converter.run(&source)?;
//! assert_eq!(stats.inserted, 2);
//! # Ok::<(), eventstore_sqlite::ConverterError>(())
//! ```

pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod exit_codes;
pub mod source;
pub mod store;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used items at crate root
pub use config::{BatchFailurePolicy, ConversionConfig};
pub use converter::{Converter, PipelineState};
pub use error::{ConverterError, ConverterResult, SourceError, StoreError, ValidationError};
pub use exit_codes::ExitCode;
pub use source::{EventSource, InMemoryEventSource, JsonlEventSource};
pub use store::{RunStatus, SqliteEventStore, TargetStore};
pub use types::{
    BatchOutcome, ConversionStats, DestinationStats, EventRecord, Payload, RawEvent,
    SourceTimestamp,
};
pub use utils::ShutdownSignal;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
