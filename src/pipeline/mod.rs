//! Parallel file processing
//!
//! This module contains the core pipeline:
//! - `queue`: Bounded work queue with backpressure
//! - `process`: Per-file state machine (lock, sidecar, transform, move)
//! - `transform`: Content transforms
//! - `worker`: Worker threads that drain the queue
//! - `coordinator`: Startup, progress and graceful shutdown

pub mod coordinator;
pub mod process;
pub mod queue;
pub mod transform;
pub mod worker;

pub use coordinator::{PipelineCoordinator, PipelineProgress, RunResult};
pub use process::{Pipeline, PipelineStage};
pub use queue::{FileTask, WorkQueue};
pub use transform::{ContentTransform, TransformKind};
