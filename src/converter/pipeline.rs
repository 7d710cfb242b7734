//! The conversion pipeline
//!
//! Streams raw events from a source into the destination in batches of
//! `batch_size`. Each batch is validated and written in its own
//! transaction; every `commit_frequency` batches the checkpoint and the
//! running total are persisted so an interrupted or failed run can resume.

use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::{BatchFailurePolicy, ConversionConfig};
use crate::error::{ConverterError, ConverterResult, SourceError, StoreError, StoreResult};
use crate::source::EventSource;
use crate::store::metadata::{
    CHECKPOINT, LAST_CONVERSION, RUN_FINISHED_AT, RUN_STARTED_AT, RUN_STATUS, TOTAL_EVENTS,
};
use crate::store::{RunStatus, SqliteEventStore, TargetStore};
use crate::types::{BatchOutcome, ConversionStats, EventRecord, RawEvent};
use crate::utils::{current_timestamp, ShutdownSignal};

use super::batch::PendingBatch;
use super::retry::BackoffPolicy;
use super::state::PipelineState;

/// Cap on the events preallocated per batch
const MAX_PREALLOCATED: usize = 10_000;

/// Counters and bookkeeping for the run in progress
struct RunContext {
    stats: ConversionStats,
    started: Instant,
    batches_since_checkpoint: usize,
}

/// Converts an event log into the destination store
///
/// # Example
///
/// ```no_run
/// use eventstore_sqlite::{ConversionConfig, Converter, JsonlEventSource};
///
/// let config = ConversionConfig::new("eventstore.db").with_batch_size(500);
/// let mut converter = Converter::open(config)?;
/// let stats = converter.run(&JsonlEventSource::new("export.jsonl"))?;
/// println!("inserted {}", stats.inserted);
/// # Ok::<(), eventstore_sqlite::ConverterError>(())
/// ```
pub struct Converter<T: TargetStore = SqliteEventStore> {
    store: T,
    config: ConversionConfig,
    backoff: BackoffPolicy,
    shutdown: ShutdownSignal,
    state: PipelineState,
}

impl Converter<SqliteEventStore> {
    /// Open the SQLite destination named by `config`
    pub fn open(config: ConversionConfig) -> ConverterResult<Self> {
        config.validate()?;
        let store = SqliteEventStore::open(&config).map_err(ConverterError::Schema)?;
        Ok(Self::with_store(store, config))
    }
}

impl<T: TargetStore> Converter<T> {
    /// Create a converter writing to an already opened store
    pub fn with_store(store: T, config: ConversionConfig) -> Self {
        let backoff = BackoffPolicy::doubling(config.retry_backoff);
        Self {
            store,
            config,
            backoff,
            shutdown: ShutdownSignal::new(),
            state: PipelineState::Init,
        }
    }

    /// Use an externally owned interrupt flag (e.g. the Ctrl+C handler's)
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Handle that stops the run after the in-flight batch
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// State the pipeline is in, or ended in
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn into_store(self) -> T {
        self.store
    }

    /// Run one conversion
    ///
    /// Returns the run's statistics when the source is exhausted or the run
    /// was interrupted (`stats.interrupted`). Fatal errors carry the last
    /// committed checkpoint.
    pub fn run<S: EventSource + ?Sized>(&mut self, source: &S) -> ConverterResult<ConversionStats> {
        let started = Instant::now();
        self.state = PipelineState::Init;
        if let Err(e) = self.config.validate() {
            self.transition(PipelineState::Failed);
            return Err(e);
        }

        self.transition(PipelineState::InitializingSchema);
        let start_position = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(error = %e, "cannot initialize destination");
                self.transition(PipelineState::Failed);
                return Err(ConverterError::Schema(e));
            }
        };

        let mut ctx = RunContext {
            stats: ConversionStats {
                start_position,
                checkpoint: start_position,
                ..Default::default()
            },
            started,
            batches_since_checkpoint: 0,
        };

        info!(
            source = %source.describe(),
            start_position,
            batch_size = self.config.batch_size,
            commit_frequency = self.config.commit_frequency,
            validate = self.config.validate_data,
            "starting conversion"
        );

        self.transition(PipelineState::Streaming);
        let mut events = match source.read_from(start_position) {
            Ok(events) => events,
            Err(e) => return Err(self.fail_on_source(e, ctx)),
        };

        let mut batch =
            PendingBatch::new(start_position, self.config.batch_size.min(MAX_PREALLOCATED));
        let mut interrupted = false;

        loop {
            if self.shutdown.is_triggered() {
                interrupted = true;
                break;
            }

            match events.next() {
                None => break,
                Some(Ok(event)) => {
                    ctx.stats.events_read += 1;
                    batch.push(event);
                }
                Some(Err(SourceError::Decode { position, message })) => {
                    ctx.stats.events_read += 1;
                    ctx.stats.rejected += 1;
                    warn!(position, error = %message, "rejected undecodable event");
                    batch.skip(position);
                }
                Some(Err(e)) => {
                    drop(events);
                    return Err(self.fail_on_source(e, ctx));
                }
            }

            if batch.len() >= self.config.batch_size {
                self.transition(PipelineState::BatchFull);
                self.process_batch(&mut batch, &mut ctx)?;
                self.transition(PipelineState::Streaming);
            }
        }
        drop(events);

        if !batch.is_empty() {
            self.process_batch(&mut batch, &mut ctx)?;
        }

        let finished = if interrupted {
            self.finish_interrupted(&mut ctx)
        } else {
            self.finish_completed(&mut ctx)
        };
        if let Err(e) = finished {
            error!(error = %e, checkpoint = ctx.stats.checkpoint, "cannot finalize conversion");
            return Err(self.fail_on_store(e, &mut ctx));
        }

        ctx.stats.destination = match self.store.stats() {
            Ok(destination) => Some(destination),
            Err(e) => {
                warn!(error = %e, "cannot collect destination statistics");
                None
            }
        };
        ctx.stats.elapsed = ctx.started.elapsed();

        info!(
            state = %self.state,
            read = ctx.stats.events_read,
            inserted = ctx.stats.inserted,
            skipped = ctx.stats.skipped,
            rejected = ctx.stats.rejected,
            failed = ctx.stats.failed,
            checkpoint = ctx.stats.checkpoint,
            elapsed_ms = ctx.stats.elapsed.as_millis() as u64,
            "conversion finished"
        );
        Ok(ctx.stats)
    }

    /// Create the schema and work out where to start reading
    fn prepare(&mut self) -> StoreResult<u64> {
        self.store.initialize(self.config.skip_indexes)?;

        let start_position = if self.config.resume {
            let checkpoint = self.store.checkpoint()?;
            match checkpoint {
                Some(position) => info!(position, "resuming from stored checkpoint"),
                None => info!("no stored checkpoint, starting from the beginning"),
            }
            checkpoint.unwrap_or(0)
        } else {
            0
        };
        self.store.update_metadata_entries(&[
            (RUN_STARTED_AT, current_timestamp().to_string()),
            (RUN_STATUS, RunStatus::Running.to_string()),
        ])?;

        Ok(start_position)
    }

    /// Validate, write and account for one batch
    fn process_batch(
        &mut self,
        batch: &mut PendingBatch,
        ctx: &mut RunContext,
    ) -> ConverterResult<()> {
        let first_position = batch.first_position();
        let end_position = batch.end_position();
        let events = batch.take_events();

        self.transition(PipelineState::Validating);
        let records = self.validate_events(events, &mut ctx.stats);

        self.transition(PipelineState::Writing);
        match self.write_with_retry(&records) {
            Ok(outcome) => {
                ctx.stats.record_batch(outcome);
                ctx.stats.checkpoint = end_position;
                info!(
                    batch = ctx.stats.batches_committed,
                    inserted = outcome.inserted,
                    skipped = outcome.skipped,
                    checkpoint = end_position,
                    "batch committed"
                );
            }
            Err((e, attempts)) => {
                ctx.stats.batches_failed += 1;
                ctx.stats.failed += records.len() as u64;

                match self.config.on_batch_failure {
                    BatchFailurePolicy::Skip => {
                        ctx.stats.checkpoint = end_position;
                        error!(
                            first_position,
                            end_position,
                            attempts,
                            events = records.len(),
                            error = %e,
                            "skipping failed batch"
                        );
                    }
                    BatchFailurePolicy::Abort => {
                        error!(first_position, attempts, error = %e, "batch failed, aborting run");
                        self.finish_failed(ctx);
                        return Err(ConverterError::BatchFailed {
                            source: e,
                            first_position,
                            attempts,
                            checkpoint: ctx.stats.checkpoint,
                            stats: Box::new(ctx.stats.clone()),
                        });
                    }
                }
            }
        }

        self.transition(PipelineState::CommitCheck);
        ctx.batches_since_checkpoint += 1;
        if ctx.batches_since_checkpoint >= self.config.commit_frequency {
            if let Err(e) = self.persist_progress(ctx, &[]) {
                error!(error = %e, checkpoint = ctx.stats.checkpoint, "cannot persist checkpoint");
                return Err(self.fail_on_store(e, ctx));
            }
            ctx.batches_since_checkpoint = 0;
        }

        Ok(())
    }

    /// Turn raw events into records, counting the rejected ones
    fn validate_events(
        &self,
        events: Vec<RawEvent>,
        stats: &mut ConversionStats,
    ) -> Vec<EventRecord> {
        let mut records = Vec::with_capacity(events.len());
        for event in events {
            let position = event.position;
            match EventRecord::from_raw(event, &self.config) {
                Ok(record) => records.push(record),
                Err(e) => {
                    stats.rejected += 1;
                    warn!(position, error = %e, "rejected invalid event");
                }
            }
        }
        records
    }

    /// Write a batch, retrying transient failures with backoff
    ///
    /// On failure returns the last error and the number of attempts made.
    fn write_with_retry(
        &mut self,
        records: &[EventRecord],
    ) -> Result<BatchOutcome, (StoreError, u32)> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.store.write_batch(records) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempts <= self.config.max_batch_retries => {
                    let delay = self.backoff.next_delay(attempts - 1);
                    warn!(
                        attempt = attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient write failure, retrying batch"
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err((e, attempts)),
            }
        }
    }

    /// Save checkpoint and event total, plus any extra entries, atomically
    ///
    /// The total is counted from the destination, so rows committed by a run
    /// that crashed before its checkpoint are still included.
    fn persist_progress(&mut self, ctx: &RunContext, extra: &[(&str, String)]) -> StoreResult<()> {
        let total = self.store.event_count()?;
        let mut entries = vec![
            (CHECKPOINT, ctx.stats.checkpoint.to_string()),
            (TOTAL_EVENTS, total.to_string()),
        ];
        entries.extend(extra.iter().cloned());
        self.store.update_metadata_entries(&entries)?;
        debug!(checkpoint = ctx.stats.checkpoint, "checkpoint saved");
        Ok(())
    }

    fn finish_interrupted(&mut self, ctx: &mut RunContext) -> StoreResult<()> {
        ctx.stats.interrupted = true;
        self.persist_progress(
            ctx,
            &[
                (RUN_STATUS, RunStatus::Interrupted.to_string()),
                (RUN_FINISHED_AT, current_timestamp().to_string()),
            ],
        )?;
        warn!(
            checkpoint = ctx.stats.checkpoint,
            "conversion interrupted, rerun with resume to continue"
        );
        self.transition(PipelineState::Interrupted);
        Ok(())
    }

    fn finish_completed(&mut self, ctx: &mut RunContext) -> StoreResult<()> {
        self.transition(PipelineState::Finalizing);
        if self.config.builds_deferred_indexes() {
            info!("building deferred indexes");
            self.store.create_indexes()?;
            ctx.stats.indexes_built = true;
        }

        let now = current_timestamp().to_string();
        self.persist_progress(
            ctx,
            &[
                (RUN_STATUS, RunStatus::Completed.to_string()),
                (RUN_FINISHED_AT, now.clone()),
                (LAST_CONVERSION, now),
            ],
        )?;
        self.transition(PipelineState::Done);
        Ok(())
    }

    /// Record a failed run; metadata errors are logged, not raised
    fn finish_failed(&mut self, ctx: &mut RunContext) {
        ctx.stats.elapsed = ctx.started.elapsed();
        self.transition(PipelineState::Failed);

        let status = [
            (RUN_STATUS, RunStatus::Failed.to_string()),
            (RUN_FINISHED_AT, current_timestamp().to_string()),
        ];
        if let Err(e) = self.persist_progress(ctx, &status) {
            error!(error = %e, "cannot record failed run in metadata");
        }
    }

    fn fail_on_source(&mut self, e: SourceError, mut ctx: RunContext) -> ConverterError {
        error!(
            error = %e,
            checkpoint = ctx.stats.checkpoint,
            "event source failed, discarding partial batch"
        );
        self.finish_failed(&mut ctx);
        ConverterError::SourceUnavailable {
            source: e,
            checkpoint: ctx.stats.checkpoint,
            stats: Box::new(ctx.stats),
        }
    }

    fn fail_on_store(&mut self, e: StoreError, ctx: &mut RunContext) -> ConverterError {
        self.finish_failed(ctx);
        ConverterError::Destination {
            source: e,
            checkpoint: ctx.stats.checkpoint,
            stats: Box::new(ctx.stats.clone()),
        }
    }

        fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "pipeline state");
        self.state = next;
    }
}
