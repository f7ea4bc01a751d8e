//! Directory-listing event source

use crate::error::WatchResult;
use crate::watcher::{list_files, EventSource};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Reports files that appeared since the previous listing
///
/// Files already present when the source is created are treated as known;
/// the initial scan is responsible for those.
pub struct PollingSource {
    dir: PathBuf,
    interval: Duration,
    known: HashSet<PathBuf>,
    next_poll: Instant,
}

impl PollingSource {
    pub fn new(dir: &Path, interval: Duration) -> Self {
        let known = list_files(dir)
            .map(|files| files.into_iter().collect())
            .unwrap_or_default();

        Self {
            dir: dir.to_path_buf(),
            interval,
            known,
            next_poll: Instant::now() + interval,
        }
    }

    /// List the directory once and return new paths
    fn poll(&mut self) -> Vec<PathBuf> {
        let current: HashSet<PathBuf> = match list_files(&self.dir) {
            Ok(files) => files.into_iter().collect(),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Directory listing failed");
                return Vec::new();
            }
        };

        let mut fresh: Vec<PathBuf> = current.difference(&self.known).cloned().collect();
        fresh.sort();

        // Forget removed names so a later file with the same name is reported
        self.known = current;
        fresh
    }
}

impl EventSource for PollingSource {
    fn next_batch(&mut self, timeout: Duration) -> WatchResult<Vec<PathBuf>> {
        let now = Instant::now();
        if now < self.next_poll {
            thread::sleep(timeout.min(self.next_poll - now));
            if Instant::now() < self.next_poll {
                return Ok(Vec::new());
            }
        }

        self.next_poll = Instant::now() + self.interval;
        Ok(self.poll())
    }

    fn name(&self) -> &'static str {
        "poll"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_reports_only_new_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.txt"), "x").unwrap();

        let mut source = PollingSource::new(dir.path(), Duration::ZERO);
        assert!(source.next_batch(Duration::ZERO).unwrap().is_empty());

        fs::write(dir.path().join("new.txt"), "x").unwrap();
        assert_eq!(
            source.next_batch(Duration::ZERO).unwrap(),
            vec![dir.path().join("new.txt")]
        );
        assert!(source.next_batch(Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_reused_name_reported_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let mut source = PollingSource::new(dir.path(), Duration::ZERO);

        fs::write(&path, "1").unwrap();
        assert_eq!(source.next_batch(Duration::ZERO).unwrap().len(), 1);

        fs::remove_file(&path).unwrap();
        assert!(source.next_batch(Duration::ZERO).unwrap().is_empty());

        fs::write(&path, "2").unwrap();
        assert_eq!(source.next_batch(Duration::ZERO).unwrap(), vec![path]);
    }

    #[test]
    fn test_waits_for_interval() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = PollingSource::new(dir.path(), Duration::from_secs(60));
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        let started = Instant::now();
        assert!(source.next_batch(Duration::from_millis(20)).unwrap().is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
