//! filedrop - Drop-Directory File Processing Pipeline
//!
//! Watches an input directory, transforms every new file exactly once and
//! moves the original together with its processed output to a destination
//! directory. Progress of each file is recorded in a JSON sidecar so that
//! failures are visible without reading logs.
//!
//! # Features
//!
//! - **At-most-once processing**: A per-filename lock table plus sidecar
//!   checks make duplicate notifications harmless.
//!
//! - **Bounded parallelism**: A fixed pool of worker threads fed by a
//!   bounded queue; the watcher blocks instead of buffering without limit.
//!
//! - **Crash evidence**: Failed files keep their original and a
//!   `status=failed` sidecar with the error message.
//!
//! - **Graceful shutdown**: In-flight files finish, bounded by a timeout.
//!
//! # Architecture
//!
//! ```text
//!          input/                                         processed/
//!   ┌──────────────────┐                            ┌──────────────────┐
//!   │ a.txt  b.txt ... │                            │ a.txt a.processed│
//!   └────────┬─────────┘                            └────────▲─────────┘
//!            │ notify / polling                              │ rename
//!            ▼                                               │
//!   ┌──────────────────┐    ┌──────────────────┐    ┌────────┴─────────┐
//!   │     Watcher      │───▶│   Work Queue     │───▶│  Worker Threads  │
//!   │ - initial scan   │    │ (crossbeam       │    │  lock → .meta →  │
//!   │ - debounce       │    │  bounded)        │    │  transform →     │
//!   └──────────────────┘    └──────────────────┘    │  move → cleanup  │
//!                                                   └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Watch ./input, write to ./processed with 5 workers
//! filedrop
//!
//! # Drop some test files
//! filedrop generate -n 10 --interval 0
//!
//! # Inspect failures
//! filedrop status
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod generator;
pub mod lock;
pub mod pipeline;
pub mod progress;
pub mod watcher;

pub use config::{CliArgs, PipelineConfig, WatchMode};
pub use error::{FiledropError, PipelineOutcome, Result};
pub use pipeline::{PipelineCoordinator, RunResult};
