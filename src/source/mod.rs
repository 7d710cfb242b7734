//! Event sources
//!
//! A source yields raw events in append order, starting at a given
//! position. Positions are ordinals in the log (0 for the first event), so
//! a checkpoint is simply the position of the next event to read.
//!
//! - `JsonlEventSource`: an exported log, one JSON event per line
//! - `InMemoryEventSource`: a vector of events, for embedding and tests

mod jsonl;
mod memory;

pub use jsonl::JsonlEventSource;
pub use memory::InMemoryEventSource;

use crate::error::SourceResult;
use crate::types::RawEvent;

/// Lazy, ordered sequence of raw events
pub type EventStream<'a> = Box<dyn Iterator<Item = SourceResult<RawEvent>> + 'a>;

/// Reader over an append-only event log
///
/// Implementations must not block indefinitely: a stalled read should
/// surface as `SourceError::Unavailable`.
pub trait EventSource {
    /// Stream events starting at `position`
    ///
    /// An `Err` item with `SourceError::Decode` stands for one undecodable
    /// event; any other error ends the stream.
    fn read_from(&self, position: u64) -> SourceResult<EventStream<'_>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}
