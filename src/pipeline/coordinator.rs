//! Pipeline coordinator - owns the watcher, the worker pool and shutdown
//!
//! The coordinator is responsible for:
//! - Validating the directories and building the shared pipeline
//! - Starting the watcher and workers
//! - Progress reporting
//! - Graceful shutdown: stop discovery, let in-flight files finish, wait a
//!   bounded time for workers

use crate::config::PipelineConfig;
use crate::error::{ConfigError, Result, WorkerError};
use crate::lock::FileLockTable;
use crate::pipeline::process::Pipeline;
use crate::pipeline::queue::{WorkQueue, WorkQueueReceiver};
use crate::pipeline::transform::ContentTransform;
use crate::pipeline::worker::{aggregate_stats, Worker, WorkerStats};
use crate::watcher::{self, FileWatcher};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the coordinator checks for shutdown and reports progress
const CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Result of a pipeline run
#[derive(Debug)]
pub struct RunResult {
    /// Files archived successfully
    pub files_done: u64,

    /// Files that ended with a failed sidecar
    pub files_failed: u64,

    /// Deliveries that were no-ops
    pub files_skipped: u64,

    /// Bytes of original content processed
    pub bytes_processed: u64,

    /// Tasks the watcher placed on the queue
    pub files_queued: u64,

    /// Times the watcher found the queue full and had to wait
    pub backpressure_events: u64,

    /// Time from start to shutdown
    pub duration: Duration,

    /// Workers still running when the shutdown timeout expired
    pub pending_workers: usize,
}

impl RunResult {
    /// True if every worker finished within the shutdown timeout
    pub fn clean_shutdown(&self) -> bool {
        self.pending_workers == 0
    }
}

/// Progress information for display
#[derive(Debug, Clone)]
pub struct PipelineProgress {
    /// Files archived
    pub done: u64,

    /// Files failed
    pub failed: u64,

    /// Deliveries skipped
    pub skipped: u64,

    /// Bytes processed
    pub bytes: u64,

    /// Tasks waiting in the queue
    pub queue_size: usize,

    /// Times the watcher has waited on a full queue
    pub backpressure: u64,

    /// Workers inside a pipeline run
    pub active_workers: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl PipelineProgress {
    /// Calculate files per second rate
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.done as f64 / secs
        } else {
            0.0
        }
    }
}

/// Coordinates the watcher and worker pool
pub struct PipelineCoordinator {
    /// Configuration
    config: Arc<PipelineConfig>,

    /// Shared per-file pipeline
    pipeline: Arc<Pipeline>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl PipelineCoordinator {
    /// Create a coordinator using the configured built-in transform
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let transform: Arc<dyn ContentTransform> = Arc::new(config.transform);
        Self::with_transform(config, transform)
    }

    /// Create a coordinator with a custom transform
    ///
    /// Both directories must exist and must be distinct.
    pub fn with_transform(
        config: PipelineConfig,
        transform: Arc<dyn ContentTransform>,
    ) -> Result<Self> {
        for dir in [&config.input_dir, &config.output_dir] {
            if !dir.is_dir() {
                return Err(ConfigError::MissingDirectory { path: dir.clone() }.into());
            }
        }

        let input = fs::canonicalize(&config.input_dir)?;
        let output = fs::canonicalize(&config.output_dir)?;
        if input == output {
            return Err(ConfigError::SameDirectory { path: input }.into());
        }

        let pipeline = Arc::new(Pipeline::new(&config, FileLockTable::new(), transform));

        Ok(Self {
            config: Arc::new(config),
            pipeline,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// The lock table shared by all workers
    pub fn locks(&self) -> &FileLockTable {
        self.pipeline.locks()
    }

    /// Run until the shutdown flag is set
    pub fn run(self) -> Result<RunResult> {
        self.run_with_progress(|_| {})
    }

    /// Run until the shutdown flag is set, calling `on_tick` periodically
    pub fn run_with_progress<F>(self, mut on_tick: F) -> Result<RunResult>
    where
        F: FnMut(&PipelineProgress),
    {
        let start_time = Instant::now();

        info!(
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            workers = self.config.worker_count,
            "Starting pipeline"
        );

        let queue = WorkQueue::new(self.config.queue_size);
        let (queue_tx, queue_rx) = queue.split();

        // Attach before spawning anything so startup failures leave no threads
        let source = watcher::open_source(&self.config)?;

        let workers = self.spawn_workers(&queue_rx)?;
        let stats: Vec<Arc<WorkerStats>> = workers.iter().map(Worker::stats_handle).collect();

        let file_watcher = match FileWatcher::spawn(
            Arc::clone(&self.config),
            source,
            queue_tx,
            Arc::clone(&self.shutdown),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                // Queue is already closed (sender dropped), so workers exit
                self.shutdown.store(true, Ordering::SeqCst);
                drop(queue_rx);
                join_with_deadline(workers, Instant::now() + self.config.shutdown_timeout);
                return Err(e.into());
            }
        };

        // Wait for shutdown
        while !self.shutdown.load(Ordering::Relaxed) {
            if file_watcher.is_finished() {
                error!("Watcher stopped unexpectedly, shutting down");
                break;
            }

            let totals = aggregate_stats(stats.iter().map(Arc::as_ref));
            on_tick(&PipelineProgress {
                done: totals.done,
                failed: totals.failed,
                skipped: totals.skipped,
                bytes: totals.bytes,
                queue_size: queue_rx.pending(),
                backpressure: queue_rx.stats().backpressure_count(),
                active_workers: queue_rx.active_count(),
                total_workers: stats.len(),
                elapsed: start_time.elapsed(),
            });

            thread::sleep(CHECK_INTERVAL);
        }

        info!(
            in_flight = queue_rx.active_count(),
            waiting = queue_rx.pending(),
            "Shutdown signal received, draining"
        );
        self.shutdown.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + self.config.shutdown_timeout;

        let watch_result = file_watcher.join();

        // The watcher was the only sender, so these counts are final
        let queued = queue_rx.stats().enqueued_count();
        let backpressure = queue_rx.stats().backpressure_count();
        drop(queue_rx);

        let pending = join_with_deadline(workers, deadline);
        let totals = aggregate_stats(stats.iter().map(Arc::as_ref));
        let duration = start_time.elapsed();

        if pending > 0 {
            let err = WorkerError::ShutdownTimeout { pending };
            warn!(error = %err, "Shutdown timeout expired");
        }

        info!(
            done = totals.done,
            failed = totals.failed,
            skipped = totals.skipped,
            queued = queued,
            backpressure = backpressure,
            duration_secs = duration.as_secs(),
            "Pipeline stopped"
        );

        watch_result?;

        Ok(RunResult {
            files_done: totals.done,
            files_failed: totals.failed,
            files_skipped: totals.skipped,
            bytes_processed: totals.bytes,
            files_queued: queued,
            backpressure_events: backpressure,
            duration,
            pending_workers: pending,
        })
    }

    /// Spawn worker threads
    fn spawn_workers(&self, queue_rx: &WorkQueueReceiver) -> Result<Vec<Worker>> {
        let mut workers = Vec::with_capacity(self.config.worker_count);

        for id in 0..self.config.worker_count {
            match Worker::spawn(id, Arc::clone(&self.pipeline), queue_rx.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    // The sender drops when run returns, so spawned workers exit
                    error!(id = id, error = %e, "Failed to spawn worker");
                    return Err(e.into());
                }
            }
        }

        debug!(count = workers.len(), "Workers spawned");
        Ok(workers)
    }
}

/// Join workers that finish before `deadline`; return how many did not
fn join_with_deadline(workers: Vec<Worker>, deadline: Instant) -> usize {
    let mut remaining = workers;

    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(Worker::is_finished);

        for worker in finished {
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker failed to join cleanly");
            }
        }

        if running.is_empty() {
            return 0;
        }
        if Instant::now() >= deadline {
            for worker in &running {
                warn!(worker = worker.id(), "Worker still busy at shutdown deadline");
            }
            return running.len();
        }

        remaining = running;
        thread::sleep(Duration::from_millis(10));
    }
}
