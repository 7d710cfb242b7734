//! Data types for the converter
//!
//! This module contains the core data structures that flow through the
//! pipeline: raw source events, validated records, and run statistics.

mod event;
mod record;
mod stats;

pub use event::{Payload, RawEvent, SourceTimestamp};
pub use record::EventRecord;
pub use stats::{BatchOutcome, ConversionStats, DestinationStats};
