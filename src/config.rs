//! Conversion configuration
//!
//! One `ConversionConfig` is built at startup and passed by reference to the
//! converter, the destination store and the record transform. Nothing in the
//! crate reads configuration from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConverterError, ConverterResult};

/// Default number of events per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default number of batches between checkpoints
pub const DEFAULT_COMMIT_FREQUENCY: usize = 5;

/// Default destination path
pub const DEFAULT_DB_PATH: &str = "eventstore.db";

/// Largest payload accepted while validation is enabled (1 MiB)
pub const DEFAULT_MAX_DATA_SIZE: usize = 1024 * 1024;

/// What to do with a batch that still fails after its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BatchFailurePolicy {
    /// Stop the run; it can be resumed from the last checkpoint
    #[default]
    Abort,
    /// Count the batch's events as failed and keep going
    Skip,
}

/// Configuration for one conversion run
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Path to the destination SQLite file
    pub db_path: PathBuf,
    /// Events per transaction
    pub batch_size: usize,
    /// Committed batches between persisted checkpoints
    pub commit_frequency: usize,
    /// Run required-field and payload checks before writing
    pub validate_data: bool,
    /// Do not create indexes before the import
    pub skip_indexes: bool,
    /// When indexes were skipped, build them once the import completes
    pub defer_index_build: bool,
    /// Start from the checkpoint stored in the destination instead of position 0
    pub resume: bool,
    /// Extra attempts for a batch that hit a transient storage error
    pub max_batch_retries: u32,
    /// Delay before the first retry; doubles on every further attempt
    pub retry_backoff: Duration,
    pub on_batch_failure: BatchFailurePolicy,
    /// How long a write waits on a locked database before failing
    pub busy_timeout: Duration,
    /// Payload size limit in bytes, enforced only when validating
    pub max_data_size: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            batch_size: DEFAULT_BATCH_SIZE,
            commit_frequency: DEFAULT_COMMIT_FREQUENCY,
            validate_data: true,
            skip_indexes: false,
            defer_index_build: true,
            resume: false,
            max_batch_retries: 3,
            retry_backoff: Duration::from_millis(100),
            on_batch_failure: BatchFailurePolicy::Abort,
            busy_timeout: Duration::from_secs(30),
            max_data_size: DEFAULT_MAX_DATA_SIZE,
        }
    }
}

impl ConversionConfig {
    /// Create config writing to the given database path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_commit_frequency(mut self, commit_frequency: usize) -> Self {
        self.commit_frequency = commit_frequency;
        self
    }

    pub fn with_validation(mut self, validate_data: bool) -> Self {
        self.validate_data = validate_data;
        self
    }

    pub fn with_skip_indexes(mut self, skip_indexes: bool) -> Self {
        self.skip_indexes = skip_indexes;
        self
    }

    pub fn with_deferred_index_build(mut self, defer_index_build: bool) -> Self {
        self.defer_index_build = defer_index_build;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Set the retry budget and initial backoff for transient batch failures
    pub fn with_retries(mut self, max_batch_retries: u32, retry_backoff: Duration) -> Self {
        self.max_batch_retries = max_batch_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_batch_failure_policy(mut self, policy: BatchFailurePolicy) -> Self {
        self.on_batch_failure = policy;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_max_data_size(mut self, max_data_size: usize) -> Self {
        self.max_data_size = max_data_size;
        self
    }

    /// Get the destination path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the finalizing step has to build indexes
    pub fn builds_deferred_indexes(&self) -> bool {
        self.skip_indexes && self.defer_index_build
    }

    /// Largest number of events a crash can lose from the checkpoint
    pub fn max_unpersisted_events(&self) -> usize {
        self.batch_size.saturating_mul(self.commit_frequency)
    }

    /// Check the invariants every run relies on
    pub fn validate(&self) -> ConverterResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConverterError::Config(
                "database path is required".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConverterError::Config(
                "batch size must be positive".to_string(),
            ));
        }
        if self.commit_frequency == 0 {
            return Err(ConverterError::Config(
                "commit frequency must be positive".to_string(),
            ));
        }
        if self.max_data_size == 0 {
            return Err(ConverterError::Config(
                "max data size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
