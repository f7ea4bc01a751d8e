//! OS-notification event source

use crate::error::{WatchError, WatchResult};
use crate::watcher::{list_files, EventSource};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Capacity of the channel bridging notify callbacks to the watcher thread
const EVENT_CAPACITY: usize = 4096;

/// Event source backed by inotify / FSEvents / ReadDirectoryChangesW
pub struct NativeSource {
    /// Must stay alive or notifications stop
    _watcher: RecommendedWatcher,

    events: Receiver<notify::Result<notify::Event>>,

    /// Set by the callback when the channel was full and events were lost
    overflowed: Arc<AtomicBool>,

    dir: PathBuf,
}

impl NativeSource {
    /// Start watching `dir` (non-recursive)
    pub fn new(dir: &Path) -> WatchResult<Self> {
        let (tx, rx) = bounded(EVENT_CAPACITY);
        let overflowed = Arc::new(AtomicBool::new(false));
        let overflow_flag = Arc::clone(&overflowed);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if tx.try_send(res).is_err() {
                    overflow_flag.store(true, Ordering::Relaxed);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Watch {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(dir = %dir.display(), "Native watcher attached");

        Ok(Self {
            _watcher: watcher,
            events: rx,
            overflowed,
            dir: dir.to_path_buf(),
        })
    }

    fn collect(res: notify::Result<notify::Event>, paths: &mut Vec<PathBuf>) {
        match res {
            Ok(event) if is_candidate(&event.kind) => paths.extend(event.paths),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Watcher reported an error"),
        }
    }
}

impl EventSource for NativeSource {
    fn next_batch(&mut self, timeout: Duration) -> WatchResult<Vec<PathBuf>> {
        let mut paths = Vec::new();

        match self.events.recv_timeout(timeout) {
            Ok(res) => Self::collect(res, &mut paths),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return Err(WatchError::Disconnected),
        }
        while let Ok(res) = self.events.try_recv() {
            Self::collect(res, &mut paths);
        }

        if self.overflowed.swap(false, Ordering::Relaxed) {
            warn!(dir = %self.dir.display(), "Event channel overflowed, rescanning directory");
            match list_files(&self.dir) {
                Ok(files) => paths.extend(files),
                Err(e) => warn!(error = %e, "Rescan after overflow failed"),
            }
        }

        Ok(paths)
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

/// Events that can mean a new file is ready in the directory
fn is_candidate(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}
