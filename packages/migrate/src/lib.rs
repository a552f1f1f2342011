#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Offset-resumable orchestration of the Store-side legacy migration.
//!
//! The Store owns the actual row movement; this crate drives it one batch
//! call at a time. Progress is re-read from the Store before every batch
//! (never cached client-side), so a run that fails or is stopped mid-way
//! can be resumed later and continues exactly where the Store says it
//! should, even when the Store applied a prior batch only partially.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use survey_map_store::{StoreError, SurveyStore};
use survey_map_store_models::MigrationProgress;
use uuid::Uuid;

/// Rows the Store moves per batch call. Independent of the upload chunk
/// size; the two tune different pipelines.
pub const MIGRATION_BATCH_SIZE: u64 = 50;

/// Pause between successful batches, a rate limit on the Store.
pub const INTER_BATCH_DELAY: Duration = Duration::from_millis(500);

/// The Store reports each batch in free text like
/// `"Migración parcial: 50 registros de personas procesados"`; the count
/// is the decimal immediately before `registros`.
static PROCESSED_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+registros").expect("valid regex"));

/// Errors that halt a migration run.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A Store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The Store's batch reply carried no parseable processed count.
    #[error("Store batch reply carried no processed-record count: {message:?}")]
    UnparseableReply {
        /// The reply, verbatim.
        message: String,
    },
}

/// Lifecycle of one orchestrator handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationPhase {
    /// No loop running. Also the landing state after a cooperative stop.
    Idle,
    /// The batch loop is active.
    Running,
    /// The Store reported `next_offset >= total`.
    Completed,
    /// A Store call failed or a batch reply could not be parsed.
    Failed,
}

/// Tuning knobs for a migration run.
#[derive(Debug, Clone, Copy)]
pub struct MigrationConfig {
    /// Rows per Store batch call.
    pub batch_size: u64,
    /// Pause between successful batches.
    pub inter_batch_delay: Duration,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: MIGRATION_BATCH_SIZE,
            inter_batch_delay: INTER_BATCH_DELAY,
        }
    }
}

/// Cloneable cooperative stop flag for a running migration.
///
/// A stop is observed at the top of the next loop iteration, never
/// mid-call; an in-flight batch always completes first.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// Asks the running loop to stop before its next batch.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.stopped.store(false, Ordering::Relaxed);
    }
}

/// Summary of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Identifier for this run, carried in every log line.
    pub run_id: Uuid,
    /// Phase the run ended in: `Completed`, or `Idle` when stopped.
    pub phase: MigrationPhase,
    /// Batch calls the Store accepted.
    pub batches_applied: u64,
    /// Sum of the per-batch processed counts parsed from Store replies.
    pub rows_reported: u64,
    /// Progress as last read from the Store.
    pub progress: MigrationProgress,
    /// When the run entered the loop.
    pub started_at: DateTime<Utc>,
    /// When the run left the loop.
    pub finished_at: DateTime<Utc>,
}

/// Drives the Store-side migration batch by batch.
///
/// Owned handle: construct one where needed and pass it down. All
/// persistent migration state lives in the Store; this type only tracks
/// the phase of its own loop.
pub struct MigrationOrchestrator {
    store: Arc<dyn SurveyStore>,
    config: MigrationConfig,
    phase: MigrationPhase,
    stop: StopHandle,
}

impl MigrationOrchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn SurveyStore>, config: MigrationConfig) -> Self {
        Self {
            store,
            config,
            phase: MigrationPhase::Idle,
            stop: StopHandle::default(),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> MigrationPhase {
        self.phase
    }

    /// Returns a flag that asks the running loop to stop before its next
    /// batch.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Starts a migration from scratch: clears the destination table, then
    /// applies batches until the Store reports completion.
    ///
    /// A clearing failure surfaces immediately and no batches are
    /// attempted.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError`] when clearing fails, a Store call fails, or
    /// a batch reply carries no parseable count. The phase is left at
    /// [`MigrationPhase::Failed`].
    pub async fn start(&mut self) -> Result<MigrationReport, MigrateError> {
        let run_id = Uuid::new_v4();
        log::info!("[{run_id}] Starting migration, clearing the destination table first");
        self.phase = MigrationPhase::Running;

        if let Err(e) = self.store.clear_destination().await {
            self.phase = MigrationPhase::Failed;
            log::error!("[{run_id}] Could not clear the destination table: {e}");
            return Err(e.into());
        }

        self.run_loop(run_id).await
    }

    /// Re-enters the batch loop without clearing: continues from whatever
    /// `next_offset` the Store reports. This is the retry path after a
    /// failure or a stop.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError`] when a Store call fails or a batch reply
    /// carries no parseable count. The phase is left at
    /// [`MigrationPhase::Failed`].
    pub async fn resume(&mut self) -> Result<MigrationReport, MigrateError> {
        let run_id = Uuid::new_v4();
        log::info!("[{run_id}] Resuming migration from the Store-reported offset");
        self.phase = MigrationPhase::Running;
        self.run_loop(run_id).await
    }

    /// Clears the destination table and returns to [`MigrationPhase::Idle`]
    /// with progress zeroed. Callable from any phase.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError`] when the clearing call fails.
    pub async fn reset(&mut self) -> Result<(), MigrateError> {
        self.store.clear_destination().await?;
        self.phase = MigrationPhase::Idle;
        log::info!("Migration reset: destination cleared, progress zeroed");
        Ok(())
    }

    async fn run_loop(&mut self, run_id: Uuid) -> Result<MigrationReport, MigrateError> {
        let started_at = Utc::now();
        self.stop.clear();

        let mut batches_applied: u64 = 0;
        let mut rows_reported: u64 = 0;

        let progress = loop {
            if self.stop.is_stopped() {
                log::info!("[{run_id}] Stop requested, leaving the loop before the next batch");
                self.phase = MigrationPhase::Idle;
                break self.read_progress(run_id).await?;
            }

            let progress = self.read_progress(run_id).await?;
            let total = progress.total_persons_to_process;
            let offset = progress.next_offset;

            if offset >= total {
                self.phase = MigrationPhase::Completed;
                log::info!(
                    "[{run_id}] Migration complete: {} of {total} rows processed",
                    progress.processed_persons
                );
                break progress;
            }

            let message = match self.store.migrate_batch(self.config.batch_size, offset).await {
                Ok(message) => message,
                Err(e) => {
                    self.phase = MigrationPhase::Failed;
                    log::error!("[{run_id}] Batch at offset {offset} failed: {e}");
                    return Err(e.into());
                }
            };

            let Some(count) = parse_processed_count(&message) else {
                self.phase = MigrationPhase::Failed;
                log::error!(
                    "[{run_id}] Batch reply at offset {offset} carried no count: {message:?}"
                );
                return Err(MigrateError::UnparseableReply { message });
            };

            batches_applied += 1;
            rows_reported += count;

            let percentage = percentage_complete(offset, count, total);
            log::info!(
                "[{run_id}] Batch {batches_applied} applied at offset {offset}: {count} rows ({percentage:.1}% complete)"
            );

            tokio::time::sleep(self.config.inter_batch_delay).await;
        };

        Ok(MigrationReport {
            run_id,
            phase: self.phase,
            batches_applied,
            rows_reported,
            progress,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn read_progress(&mut self, run_id: Uuid) -> Result<MigrationProgress, MigrateError> {
        match self.store.get_migration_progress().await {
            Ok(progress) => Ok(progress),
            Err(e) => {
                self.phase = MigrationPhase::Failed;
                log::error!("[{run_id}] Could not read migration progress: {e}");
                Err(e.into())
            }
        }
    }
}

/// Extracts the processed-record count out of a batch success message.
#[must_use]
pub fn parse_processed_count(message: &str) -> Option<u64> {
    PROCESSED_COUNT_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|count| count.as_str().parse().ok())
}

/// Percentage complete after a batch, from the offset the batch ran at and
/// the count it reported. Capped at 100.
#[allow(clippy::cast_precision_loss)]
fn percentage_complete(offset: u64, batch_count: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let done = offset.saturating_add(batch_count).min(total);
    done as f64 / total as f64 * 100.0
}
