//! Worker threads for parallel file processing
//!
//! Each worker:
//! - Pulls file tasks from the work queue
//! - Runs them through the shared pipeline, one at a time
//! - Records the outcome in its own counters
//!
//! Workers stop once the queue is closed and drained, so every task that
//! made it into the queue before shutdown still reaches a terminal state.

use crate::error::{PipelineOutcome, WorkerError};
use crate::pipeline::process::Pipeline;
use crate::pipeline::queue::{WorkGuard, WorkQueueReceiver};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Files archived successfully
    pub files_done: AtomicU64,

    /// Files that ended with a failed sidecar
    pub files_failed: AtomicU64,

    /// Deliveries that were no-ops (lock busy, already gone, sidecar present)
    pub files_skipped: AtomicU64,

    /// Bytes of original content processed
    pub bytes_processed: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: &PipelineOutcome) {
        match outcome {
            PipelineOutcome::Done { bytes, .. } => {
                self.files_done.fetch_add(1, Ordering::Relaxed);
                self.bytes_processed.fetch_add(*bytes, Ordering::Relaxed);
            }
            PipelineOutcome::Skipped { .. } => {
                self.files_skipped.fetch_add(1, Ordering::Relaxed);
            }
            PipelineOutcome::Failed { .. } => {
                self.files_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Totals across the worker pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub done: u64,
    pub failed: u64,
    pub skipped: u64,
    pub bytes: u64,
}

/// A worker thread that processes file tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<Result<(), WorkerError>>>,

    /// Worker statistics
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        pipeline: Arc<Pipeline>,
        queue_rx: WorkQueueReceiver,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || worker_loop(id, pipeline, queue_rx, stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Shared handle to the statistics, usable after the worker is joined
    pub fn stats_handle(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Check whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Panicked {
                    id: self.id,
                    message: "Worker thread panicked".into(),
                }),
            }
        } else {
            Ok(())
        }
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    pipeline: Arc<Pipeline>,
    queue_rx: WorkQueueReceiver,
    stats: Arc<WorkerStats>,
) -> Result<(), WorkerError> {
    debug!(worker = id, "Worker starting");

    while let Some(task) = queue_rx.recv() {
        // Mark as actively working
        let _guard = WorkGuard::new(&queue_rx);

        let outcome = pipeline.run(&task);
        stats.record(&outcome);

        match &outcome {
            PipelineOutcome::Done { file, bytes } => {
                trace!(worker = id, file = %file, bytes = bytes, "File done");
            }
            PipelineOutcome::Skipped { file, reason } => {
                debug!(worker = id, file = %file, reason = %reason, "File skipped");
            }
            PipelineOutcome::Failed { file, error } => {
                warn!(worker = id, file = %file, kind = error.kind(), "File failed");
            }
        }
    }

    info!(
        worker = id,
        done = stats.files_done.load(Ordering::Relaxed),
        failed = stats.files_failed.load(Ordering::Relaxed),
        "Worker shutting down"
    );

    Ok(())
}

/// Aggregate statistics from multiple workers
pub fn aggregate_stats<'a, I>(stats: I) -> PoolTotals
where
    I: IntoIterator<Item = &'a WorkerStats>,
{
    let mut totals = PoolTotals::default();

    for s in stats {
        totals.done += s.files_done.load(Ordering::Relaxed);
        totals.failed += s.files_failed.load(Ordering::Relaxed);
        totals.skipped += s.files_skipped.load(Ordering::Relaxed);
        totals.bytes += s.bytes_processed.load(Ordering::Relaxed);
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::{SkipReason, StageError};
    use crate::lock::FileLockTable;
    use crate::pipeline::queue::{FileTask, WorkQueue};
    use crate::pipeline::transform::TransformKind;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn test_worker_stats() {
        let stats = WorkerStats::default();

        stats.record(&PipelineOutcome::Done {
            file: "a.txt".into(),
            bytes: 12,
        });
        stats.record(&PipelineOutcome::Skipped {
            file: "a.txt".into(),
            reason: SkipReason::LockBusy,
        });
        stats.record(&PipelineOutcome::Failed {
            file: "b.txt".into(),
            error: StageError::Transform {
                file: "b.txt".into(),
                reason: "bad".into(),
            },
        });

        assert_eq!(stats.files_done.load(Ordering::Relaxed), 1);
        assert_eq!(stats.files_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(stats.files_failed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_processed.load(Ordering::Relaxed), 12);

        let totals = aggregate_stats([&stats, &stats]);
        assert_eq!(totals.done, 2);
        assert_eq!(totals.bytes, 24);
    }

    #[test]
    fn test_workers_drain_closed_queue() {
        let root = tempfile::tempdir().unwrap();
        let input: PathBuf = root.path().join("input");
        let output: PathBuf = root.path().join("processed");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();

        let config = PipelineConfig::new(&input, &output);
        let pipeline = Arc::new(Pipeline::new(
            &config,
            FileLockTable::new(),
            Arc::new(TransformKind::Uppercase),
        ));

        let queue = WorkQueue::new(16);
        let (tx, rx) = queue.split();
        let running = AtomicBool::new(false);
        for i in 0..6 {
            let path = input.join(format!("f{i}.txt"));
            fs::write(&path, format!("content-{i}")).unwrap();
            let task = FileTask::from_path(path).unwrap();
            assert!(tx.send(task, &running, Duration::from_millis(10)).unwrap());
        }
        drop(tx);

        let workers: Vec<_> = (0..3)
            .map(|id| Worker::spawn(id, Arc::clone(&pipeline), rx.clone()).unwrap())
            .collect();
        drop(rx);

        let stats: Vec<_> = workers.iter().map(Worker::stats_handle).collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let totals = aggregate_stats(stats.iter().map(Arc::as_ref));
        assert_eq!(totals.done, 6);
        assert_eq!(totals.failed, 0);
        assert_eq!(fs::read_to_string(output.join("f3.processed")).unwrap(), "CONTENT-3");
    }
}
