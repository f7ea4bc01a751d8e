//! File discovery
//!
//! The watcher thread turns filesystem activity in the input directory into
//! [`FileTask`]s on the work queue:
//!
//! 1. Attach the event source (native notifications or polling)
//! 2. Queue every matching file already present, in name order
//! 3. Feed source events through the [`Debouncer`] and queue quiet paths
//!
//! Queueing blocks while the queue is full. When shutdown is signalled the
//! thread returns and drops its sender, which closes the queue.

pub mod debounce;
pub mod native;
pub mod poll;

pub use debounce::Debouncer;
pub use native::NativeSource;
pub use poll::PollingSource;

use crate::artifact::Naming;
use crate::config::{PipelineConfig, WatchMode};
use crate::error::{WatchError, WatchResult};
use crate::pipeline::queue::{FileTask, WorkQueueSender};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// How often the watcher thread wakes to check shutdown and debounce timers
const WATCH_TICK: Duration = Duration::from_millis(50);

/// A source of candidate paths in the input directory
pub trait EventSource: Send {
    /// Wait up to `timeout` and return paths that may hold new files
    ///
    /// Paths can repeat and can name files that are already gone.
    fn next_batch(&mut self, timeout: Duration) -> WatchResult<Vec<PathBuf>>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Create the event source selected by `config`
pub fn open_source(config: &PipelineConfig) -> WatchResult<Box<dyn EventSource>> {
    Ok(match config.watch_mode {
        WatchMode::Native => Box::new(NativeSource::new(&config.input_dir)?),
        WatchMode::Poll => Box::new(PollingSource::new(&config.input_dir, config.poll_interval)),
    })
}

/// Regular files directly inside `dir`, sorted by path
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Decides whether a path names a file the pipeline should see
#[derive(Debug, Clone)]
struct TaskFilter {
    naming: Naming,
    config: Arc<PipelineConfig>,
}

impl TaskFilter {
    fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.naming.matches(name) && !self.config.is_excluded(name)
    }
}

/// Handle to the watcher thread
pub struct FileWatcher {
    handle: Option<JoinHandle<WatchResult<()>>>,
}

impl FileWatcher {
    /// Scan the input directory and start the watcher thread
    ///
    /// `source` must already be attached so that files created during the
    /// scan are still reported.
    pub fn spawn(
        config: Arc<PipelineConfig>,
        source: Box<dyn EventSource>,
        queue_tx: WorkQueueSender,
        shutdown: Arc<AtomicBool>,
    ) -> WatchResult<Self> {
        let filter = TaskFilter {
            naming: Naming::new(&config.extension),
            config: Arc::clone(&config),
        };

        let existing: Vec<PathBuf> = list_files(&config.input_dir)
            .map_err(|e| WatchError::Watch {
                path: config.input_dir.clone(),
                reason: e.to_string(),
            })?
            .into_iter()
            .filter(|p| filter.accepts(p))
            .collect();

        info!(
            dir = %config.input_dir.display(),
            source = source.name(),
            existing = existing.len(),
            "Watching for files"
        );

        let debounce = config.debounce;

        let handle = thread::Builder::new()
            .name("watcher".into())
            .spawn(move || watch_loop(filter, source, existing, debounce, queue_tx, shutdown))
            .map_err(|e| WatchError::Init(e.to_string()))?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Check whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the watcher thread to exit
    pub fn join(mut self) -> WatchResult<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(WatchError::Init("watcher thread panicked".into()))),
            None => Ok(()),
        }
    }
}

/// Result of trying to queue one path
enum Queued {
    Yes,
    Dropped,
    Shutdown,
}

/// Main watcher loop
fn watch_loop(
    filter: TaskFilter,
    mut source: Box<dyn EventSource>,
    existing: Vec<PathBuf>,
    debounce: Duration,
    queue_tx: WorkQueueSender,
    shutdown: Arc<AtomicBool>,
) -> WatchResult<()> {
    let mut events_seen: u64 = 0;

    for path in existing {
        match enqueue(path, &queue_tx, &shutdown)? {
            Queued::Shutdown => return Ok(()),
            Queued::Yes | Queued::Dropped => {}
        }
    }

    let mut debouncer = Debouncer::new(debounce);

    while !shutdown.load(Ordering::Relaxed) {
        let batch = match source.next_batch(WATCH_TICK) {
            Ok(batch) => batch,
            Err(e) => {
                error!(source = source.name(), error = %e, "Event source failed");
                return Err(e);
            }
        };

        let now = Instant::now();
        for path in batch {
            events_seen += 1;
            if filter.accepts(&path) {
                debouncer.record(path, now);
            } else {
                trace!(path = %path.display(), "Ignoring path");
            }
        }

        for path in debouncer.drain_ready(Instant::now()) {
            if let Queued::Shutdown = enqueue(path, &queue_tx, &shutdown)? {
                break;
            }
        }
    }

    debug!(
        events = events_seen,
        pending = debouncer.len(),
        "Watcher stopping"
    );

    Ok(())
}

/// Queue `path` if it is still a regular file, blocking on backpressure
fn enqueue(
    path: PathBuf,
    queue_tx: &WorkQueueSender,
    shutdown: &AtomicBool,
) -> WatchResult<Queued> {
    if !path.is_file() {
        trace!(path = %path.display(), "Path vanished before queueing");
        return Ok(Queued::Dropped);
    }

    let Some(task) = FileTask::from_path(path) else {
        return Ok(Queued::Dropped);
    };
    let filename = task.filename.clone();

    match queue_tx.send(task, shutdown, WATCH_TICK) {
        Ok(true) => {
            debug!(file = %filename, "Queued");
            Ok(Queued::Yes)
        }
        Ok(false) => {
            warn!(file = %filename, "Shutdown while queue was full, file left for next start");
            Ok(Queued::Shutdown)
        }
        Err(()) => Err(WatchError::Disconnected),
    }
}
