//! Per-filename processing locks
//!
//! A single table of held filenames behind one mutex. Acquisition is an
//! insert-if-absent under that mutex, so two callers can never both observe
//! a filename as free. The returned guard removes the entry when dropped,
//! including during unwinding.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of a lock attempt
#[derive(Debug)]
pub enum LockAttempt {
    /// Caller now owns the filename until the guard is dropped
    Acquired(FileLockGuard),

    /// Someone else owns it; never wait for it
    Busy,
}

impl LockAttempt {
    /// Convert into the guard, `None` if busy
    pub fn guard(self) -> Option<FileLockGuard> {
        match self {
            LockAttempt::Acquired(guard) => Some(guard),
            LockAttempt::Busy => None,
        }
    }
}

/// Shared table of filenames currently being processed
///
/// Cloning is cheap and every clone refers to the same table.
#[derive(Debug, Clone, Default)]
pub struct FileLockTable {
    held: Arc<Mutex<HashSet<String>>>,
}

impl FileLockTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take ownership of `filename` without blocking
    pub fn acquire(&self, filename: &str) -> LockAttempt {
        let inserted = self.held.lock().insert(filename.to_string());
        if inserted {
            LockAttempt::Acquired(FileLockGuard {
                filename: filename.to_string(),
                held: Arc::clone(&self.held),
            })
        } else {
            LockAttempt::Busy
        }
    }

    /// Check whether `filename` is currently owned
    pub fn is_held(&self, filename: &str) -> bool {
        self.held.lock().contains(filename)
    }

    /// Number of filenames currently owned
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Ownership of one filename; released on drop
#[derive(Debug)]
pub struct FileLockGuard {
    filename: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl FileLockGuard {
    /// The locked filename
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_second_acquire_is_busy() {
        let table = FileLockTable::new();

        let guard = table.acquire("a.txt").guard().unwrap();
        assert_eq!(guard.filename(), "a.txt");
        assert!(matches!(table.acquire("a.txt"), LockAttempt::Busy));

        // Other names are independent
        assert!(table.acquire("b.txt").guard().is_some());
    }

    #[test]
    fn test_release_on_drop() {
        let table = FileLockTable::new();

        {
            let _guard = table.acquire("a.txt").guard().unwrap();
            assert!(table.is_held("a.txt"));
        }

        assert!(!table.is_held("a.txt"));
        assert_eq!(table.held_count(), 0);
        assert!(table.acquire("a.txt").guard().is_some());
    }

    #[test]
    fn test_release_on_panic() {
        let table = FileLockTable::new();
        let inner = table.clone();

        let result = thread::spawn(move || {
            let _guard = inner.acquire("a.txt").guard().unwrap();
            panic!("pipeline exploded");
        })
        .join();

        assert!(result.is_err());
        assert!(!table.is_held("a.txt"));
    }

    #[test]
    fn test_concurrent_acquire_single_winner() {
        let table = FileLockTable::new();
        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let winners = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let table = table.clone();
                let barrier = Arc::clone(&barrier);
                let release = Arc::clone(&release);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    barrier.wait();
                    let attempt = table.acquire("burst.txt");
                    if matches!(attempt, LockAttempt::Acquired(_)) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    // Hold until everyone has tried
                    release.wait();
                    drop(attempt);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(table.held_count(), 0);
    }
}
