//! Collapse bursts of events for the same path

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Holds paths until they have been quiet for `window`
///
/// A path emitted by [`Debouncer::drain_ready`] is ignored for another
/// `window` afterwards, so trailing write events from the producer do not
/// cause a second delivery.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,

    /// Path -> time of the most recent event
    pending: HashMap<PathBuf, Instant>,

    /// Path -> time it was last emitted
    emitted: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
            emitted: HashMap::new(),
        }
    }

    /// Note an event for `path` at `now`
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        if let Some(at) = self.emitted.get(&path) {
            if now.saturating_duration_since(*at) < self.window {
                return;
            }
        }
        self.pending.insert(path, now);
    }

    /// Remove and return every path that has been quiet for the window
    ///
    /// Returned paths are sorted so emission order is stable.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        self.emitted
            .retain(|_, at| now.saturating_duration_since(*at) < window);

        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= window)
            .map(|(path, _)| path.clone())
            .collect();
        ready.sort();

        for path in &ready {
            self.pending.remove(path);
            self.emitted.insert(path.clone(), now);
        }

        ready
    }

    /// Number of paths still waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn test_burst_collapses_to_one() {
        let mut d = Debouncer::new(WINDOW);
        let t0 = Instant::now();
        let path = PathBuf::from("/in/a.txt");

        d.record(path.clone(), t0);
        d.record(path.clone(), t0 + Duration::from_millis(20));
        d.record(path.clone(), t0 + Duration::from_millis(40));
        assert_eq!(d.len(), 1);

        // Quiet period restarts on each event
        assert!(d.drain_ready(t0 + Duration::from_millis(120)).is_empty());
        assert_eq!(d.drain_ready(t0 + Duration::from_millis(140)), vec![path]);
        assert!(d.is_empty());
    }

    #[test]
    fn test_trailing_events_suppressed() {
        let mut d = Debouncer::new(WINDOW);
        let t0 = Instant::now();
        let path = PathBuf::from("/in/a.txt");

        d.record(path.clone(), t0);
        assert_eq!(d.drain_ready(t0 + WINDOW).len(), 1);

        d.record(path.clone(), t0 + WINDOW + Duration::from_millis(10));
        assert!(d.is_empty());

        // After the window the path is eligible again
        let later = t0 + WINDOW * 3;
        d.record(path.clone(), later);
        assert_eq!(d.drain_ready(later + WINDOW), vec![path]);
    }

    #[test]
    fn test_zero_window_emits_immediately() {
        let mut d = Debouncer::new(Duration::ZERO);
        let now = Instant::now();

        d.record(PathBuf::from("/in/b.txt"), now);
        d.record(PathBuf::from("/in/a.txt"), now);

        assert_eq!(
            d.drain_ready(now),
            vec![PathBuf::from("/in/a.txt"), PathBuf::from("/in/b.txt")]
        );
    }
}
