//! Record validation rules
//!
//! Checks applied to raw events before they are accepted into a batch.
//! Every check is skipped when validation is disabled.

mod rules;

pub use rules::{check_payload_size, require_positive_timestamp, require_text};
