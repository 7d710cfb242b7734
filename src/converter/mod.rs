//! Conversion pipeline
//!
//! ```text
//! EventSource ──► PendingBatch ──► EventRecord::from_raw ──► TargetStore::write_batch
//!                  (batch_size)      (rejects invalid)          (retry / skip / abort)
//!                                                                      │
//!                          checkpoint every commit_frequency batches ◄─┘
//! ```

mod batch;
mod pipeline;
mod retry;
mod state;

pub use pipeline::Converter;
pub use retry::{BackoffPolicy, MAX_RETRY_DELAY};
pub use state::PipelineState;
