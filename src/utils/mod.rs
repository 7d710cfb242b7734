//! Utility functions and helpers
//!
//! Timestamp helpers and the interrupt flag shared with the Ctrl+C handler.

pub mod shutdown;
pub mod time;

pub use shutdown::ShutdownSignal;
pub use time::{current_timestamp, format_timestamp};
