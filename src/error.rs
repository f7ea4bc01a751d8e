//! Error types for filedrop
//!
//! This module defines the error hierarchy that covers:
//! - Sidecar metadata reads and writes
//! - Per-file pipeline stage failures
//! - Filesystem watching
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Pipeline stage errors never escape a worker: they are folded into a
//! [`PipelineOutcome`] and recorded in the file's sidecar. Only startup
//! errors reach `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the filedrop application
#[derive(Error, Debug)]
pub enum FiledropError {
    /// Metadata store errors
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Filesystem watcher errors
    #[error("Watcher error: {0}")]
    Watch(#[from] WatchError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (directory bootstrap, generator, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sidecar metadata errors
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Could not write or replace the sidecar
    #[error("Failed to write metadata '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not remove the sidecar
    #[error("Failed to delete metadata '{path}': {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read the sidecar
    #[error("Failed to read metadata '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sidecar exists but does not hold a valid record (unknown status, bad JSON)
    #[error("Invalid metadata record '{path}': {reason}")]
    InvalidRecord { path: PathBuf, reason: String },
}

/// A failure in one stage of the per-file pipeline
#[derive(Error, Debug)]
pub enum StageError {
    /// Writing the processing/completed sidecar failed
    #[error("metadata write failed for '{file}': {source}")]
    MetadataWrite {
        file: String,
        #[source]
        source: MetadataError,
    },

    /// Removing the sidecar after archival failed
    #[error("metadata delete failed for '{file}': {source}")]
    MetadataDelete {
        file: String,
        #[source]
        source: MetadataError,
    },

    /// Reading, decoding or writing the transformed content failed
    #[error("transform failed for '{file}': {reason}")]
    Transform { file: String, reason: String },

    /// Renaming artifacts into the destination failed
    #[error("move of '{path}' failed: {source}")]
    Move {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline run panicked
    #[error("pipeline panicked for '{file}': {message}")]
    Panicked { file: String, message: String },
}

impl StageError {
    /// Short, stable name of the error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::MetadataWrite { .. } => "metadata_write",
            StageError::MetadataDelete { .. } => "metadata_delete",
            StageError::Transform { .. } => "transform",
            StageError::Move { .. } => "move",
            StageError::Panicked { .. } => "panic",
        }
    }
}

/// Filesystem watcher errors
#[derive(Error, Debug)]
pub enum WatchError {
    /// Failed to create the native watcher
    #[error("Failed to initialize watcher: {0}")]
    Init(String),

    /// Failed to register a directory with the watcher
    #[error("Failed to watch '{path}': {reason}")]
    Watch { path: PathBuf, reason: String },

    /// The event stream ended
    #[error("Event source disconnected")]
    Disconnected,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid queue size
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Extension filter is empty, has an inner dot or contains a path separator
    #[error("Invalid extension '{extension}': {reason}")]
    InvalidExtension { extension: String, reason: String },

    /// Generator interval is not a usable duration
    #[error("Invalid interval {value}: {reason}")]
    InvalidInterval { value: f64, reason: String },

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// A required directory is missing
    #[error("Directory '{path}' does not exist")]
    MissingDirectory { path: PathBuf },

    /// Input and destination resolve to the same directory
    #[error("Input and output directory must differ (both are '{path}')")]
    SameDirectory { path: PathBuf },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked outside a pipeline run
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Thread spawn failed
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Workers did not exit before the shutdown deadline
    #[error("Shutdown timed out with {pending} worker(s) still running")]
    ShutdownTimeout { pending: usize },
}

/// Result type alias for FiledropError
pub type Result<T> = std::result::Result<T, FiledropError>;

/// Result type alias for MetadataError
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Result type alias for WatchError
pub type WatchResult<T> = std::result::Result<T, WatchError>;

/// Why a pipeline run was skipped without touching any artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another worker holds the file lock
    LockBusy,

    /// The original is gone (already archived or removed by the producer)
    SourceMissing,

    /// A sidecar from an earlier run is still present and awaits triage
    UnresolvedSidecar,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::LockBusy => "lock busy",
            SkipReason::SourceMissing => "source missing",
            SkipReason::UnresolvedSidecar => "unresolved sidecar",
        };
        f.write_str(text)
    }
}

/// Represents the outcome of running the pipeline for a single file
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Artifacts archived and sidecar removed
    Done { file: String, bytes: u64 },

    /// Nothing was done for this delivery
    Skipped { file: String, reason: SkipReason },

    /// A stage failed; the sidecar records the cause
    Failed { file: String, error: StageError },
}

impl PipelineOutcome {
    /// Returns true if this outcome represents success
    pub fn is_done(&self) -> bool {
        matches!(self, PipelineOutcome::Done { .. })
    }

    /// Returns true if the run failed
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed { .. })
    }
}
