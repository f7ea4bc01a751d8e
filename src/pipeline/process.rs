//! Per-file processing pipeline
//!
//! One run takes a file through:
//!
//! ```text
//! LockAcquired → MetaProcessing → Transformed → MetaCompleted → Moved → MetaDeleted → Done
//!           \______________\______________\______________\_________\→ Failed
//! ```
//!
//! [`PipelineStage`] tracks the intermediate states; `Done` and `Failed` are
//! the terminal [`PipelineOutcome`] variants.
//!
//! The lock guard lives for the whole run, so it is released on every exit
//! path. Any stage error (or panic) after the lock is taken ends in a
//! best-effort `failed` sidecar; nothing is retried.

use crate::artifact::{write_atomic, ArtifactNames, MetadataStatus, MetadataStore, Naming};
use crate::config::PipelineConfig;
use crate::error::{PipelineOutcome, SkipReason, StageError};
use crate::lock::FileLockTable;
use crate::pipeline::queue::FileTask;
use crate::pipeline::transform::ContentTransform;
use rand::Rng;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Last stage a run reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    LockAcquired,
    MetaProcessing,
    Transformed,
    MetaCompleted,
    Moved,
    MetaDeleted,
}

/// Runs files through the processing stages
pub struct Pipeline {
    /// Directory holding originals, outputs-in-progress and sidecars
    input_dir: PathBuf,

    /// Destination for archived pairs
    output_dir: PathBuf,

    naming: Naming,
    metadata: MetadataStore,
    locks: FileLockTable,
    transform: Arc<dyn ContentTransform>,

    /// Upper bound of the random pre-transform delay
    max_jitter: Duration,
}

impl Pipeline {
    /// Create a pipeline for `config` sharing `locks`
    pub fn new(
        config: &PipelineConfig,
        locks: FileLockTable,
        transform: Arc<dyn ContentTransform>,
    ) -> Self {
        let naming = Naming::new(&config.extension);
        Self {
            input_dir: config.input_dir.clone(),
            output_dir: config.output_dir.clone(),
            metadata: MetadataStore::new(config.input_dir.clone(), naming.clone()),
            naming,
            locks,
            transform,
            max_jitter: config.max_jitter,
        }
    }

    /// The lock table this pipeline acquires from
    pub fn locks(&self) -> &FileLockTable {
        &self.locks
    }

    /// The sidecar store
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Run one file to a terminal state
    pub fn run(&self, task: &FileTask) -> PipelineOutcome {
        let file = task.filename.clone();

        let Some(_guard) = self.locks.acquire(&file).guard() else {
            debug!(file = %file, "Lock busy, skipping duplicate delivery");
            return PipelineOutcome::Skipped {
                file,
                reason: SkipReason::LockBusy,
            };
        };

        if !task.path.exists() {
            debug!(file = %file, "Source no longer present, skipping");
            return PipelineOutcome::Skipped {
                file,
                reason: SkipReason::SourceMissing,
            };
        }

        if self.metadata.exists(&file) {
            warn!(
                file = %file,
                sidecar = %self.metadata.path_for(&file).display(),
                "Sidecar from an earlier run present, leaving file for triage"
            );
            return PipelineOutcome::Skipped {
                file,
                reason: SkipReason::UnresolvedSidecar,
            };
        }

        let mut stage = PipelineStage::LockAcquired;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.advance(task, &mut stage)))
            .unwrap_or_else(|payload| {
                Err(StageError::Panicked {
                    file: file.clone(),
                    message: panic_message(payload.as_ref()),
                })
            });

        match result {
            Ok(bytes) => {
                debug_assert_eq!(stage, PipelineStage::MetaDeleted);
                info!(file = %file, bytes = bytes, "Successfully processed");
                PipelineOutcome::Done { file, bytes }
            }
            Err(error) => {
                self.record_failure(&file, stage, &error);
                PipelineOutcome::Failed { file, error }
            }
        }
    }

    /// Drive the stages in order, updating `stage` as each one completes
    fn advance(&self, task: &FileTask, stage: &mut PipelineStage) -> Result<u64, StageError> {
        let file = &task.filename;
        let names = self.naming.artifacts(file);

        self.metadata
            .write(file, MetadataStatus::Processing, None)
            .map_err(|source| StageError::MetadataWrite {
                file: file.clone(),
                source,
            })?;
        *stage = PipelineStage::MetaProcessing;
        trace!(file = %file, "Sidecar written (processing)");

        self.jitter();

        let processed_path = self.input_dir.join(&names.processed);
        let bytes = self.transform_file(file, &task.path, &processed_path)?;
        *stage = PipelineStage::Transformed;

        self.metadata
            .write(file, MetadataStatus::Completed, None)
            .map_err(|source| StageError::MetadataWrite {
                file: file.clone(),
                source,
            })?;
        *stage = PipelineStage::MetaCompleted;

        self.move_pair(&task.path, &processed_path, &names)?;
        *stage = PipelineStage::Moved;

        self.metadata
            .delete(file)
            .map_err(|source| StageError::MetadataDelete {
                file: file.clone(),
                source,
            })?;
        *stage = PipelineStage::MetaDeleted;
        Ok(bytes)
    }

    /// Read, transform and write the processed output
    fn transform_file(&self, file: &str, source: &Path, dest: &Path) -> Result<u64, StageError> {
        let raw = fs::read(source).map_err(|e| StageError::Transform {
            file: file.to_string(),
            reason: format!("could not read file: {e}"),
        })?;
        let bytes = raw.len() as u64;

        let content = String::from_utf8(raw).map_err(|e| StageError::Transform {
            file: file.to_string(),
            reason: format!("content is not valid UTF-8: {e}"),
        })?;

        let output = self.transform.apply(&content);

        write_atomic(dest, output.as_bytes()).map_err(|e| StageError::Transform {
            file: file.to_string(),
            reason: format!("could not write processed file: {e}"),
        })?;

        debug!(file = %file, transform = self.transform.name(), bytes = bytes, "Content transformed");
        Ok(bytes)
    }

    /// Rename the processed output and the original into the destination
    ///
    /// Both move or neither: if the original cannot follow, the processed
    /// file is moved back.
    fn move_pair(
        &self,
        original: &Path,
        processed: &Path,
        names: &ArtifactNames,
    ) -> Result<(), StageError> {
        let processed_dest = self.output_dir.join(&names.processed);
        let original_dest = self.output_dir.join(&names.original);

        fs::rename(processed, &processed_dest).map_err(|source| StageError::Move {
            path: processed.to_path_buf(),
            source,
        })?;

        if let Err(source) = fs::rename(original, &original_dest) {
            if let Err(e) = fs::rename(&processed_dest, processed) {
                error!(
                    file = %names.original,
                    error = %e,
                    "Could not roll back processed artifact; pair is split between directories"
                );
            }
            return Err(StageError::Move {
                path: original.to_path_buf(),
                source,
            });
        }

        Ok(())
    }

    /// Log the failure and leave a `failed` sidecar behind
    fn record_failure(&self, file: &str, stage: PipelineStage, error: &StageError) {
        error!(
            file = %file,
            stage = ?stage,
            kind = error.kind(),
            error = %error,
            "Pipeline failed"
        );

        if stage >= PipelineStage::MetaCompleted && matches!(error, StageError::Move { .. }) {
            warn!(
                file = %file,
                "Sidecar said completed but artifacts were not archived; manual follow-up required"
            );
        }

        if let Err(e) = self
            .metadata
            .write(file, MetadataStatus::Failed, Some(&error.to_string()))
        {
            error!(file = %file, error = %e, "Could not record failure in sidecar");
        }
    }

    /// Sleep for a random duration up to `max_jitter`
    fn jitter(&self) {
        if self.max_jitter.is_zero() {
            return;
        }
        let max_ms = self.max_jitter.as_millis() as u64;
        let ms = rand::rng().random_range(0..=max_ms);
        thread::sleep(Duration::from_millis(ms));
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
