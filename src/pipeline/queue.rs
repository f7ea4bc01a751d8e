//! Work queue with backpressure support
//!
//! This module provides the bounded queue that carries file tasks from the
//! watcher to the worker pool. When the queue is full, the watcher blocks
//! instead of dropping work. Dropping every sender closes the queue; workers
//! then drain what is left and stop.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A file waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Original filename (no directory)
    pub filename: String,

    /// Full path in the input directory
    pub path: PathBuf,

    /// When the watcher emitted this task
    pub discovered_at: DateTime<Utc>,
}

impl FileTask {
    /// Create a task for `path`; `None` if the path has no UTF-8 filename
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let filename = path.file_name()?.to_str()?.to_string();
        Some(Self {
            filename,
            path,
            discovered_at: Utc::now(),
        })
    }
}

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: AtomicU64,

    /// Number of times a send found the queue full
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    /// Get the number of tasks enqueued so far
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Get backpressure event count
    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Bounded FIFO of file tasks
pub struct WorkQueue {
    /// Sender for adding tasks
    sender: Sender<FileTask>,

    /// Receiver for getting tasks
    receiver: Receiver<FileTask>,

    /// Number of workers inside a pipeline run
    active_workers: Arc<AtomicUsize>,

    /// Queue statistics
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Create a new work queue with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);

        Self {
            sender,
            receiver,
            active_workers: Arc::new(AtomicUsize::new(0)),
            stats: Arc::new(QueueStats::default()),
        }
    }

    fn sender(&self) -> WorkQueueSender {
        WorkQueueSender {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Receiver handle; clone it for each worker
    fn receiver(&self) -> WorkQueueReceiver {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
            active_workers: Arc::clone(&self.active_workers),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Split into one sender and one receiver, dropping the queue's own handles
    ///
    /// After this, the queue closes as soon as the returned sender (and its
    /// clones) are dropped.
    pub fn split(self) -> (WorkQueueSender, WorkQueueReceiver) {
        (self.sender(), self.receiver())
    }
}

/// Handle for sending tasks to the queue
#[derive(Clone)]
pub struct WorkQueueSender {
    sender: Sender<FileTask>,
    stats: Arc<QueueStats>,
}

impl WorkQueueSender {
    /// Send a task, blocking while the queue is full
    ///
    /// The shutdown flag is re-checked every `tick` while blocked.
    ///
    /// Returns `Ok(true)` if sent
    /// Returns `Ok(false)` if shutdown was signalled before space freed up
    /// Returns `Err` if queue is disconnected
    pub fn send(&self, task: FileTask, shutdown: &AtomicBool, tick: Duration) -> Result<bool, ()> {
        let mut task = match self.sender.try_send(task) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                return Ok(true);
            }
            Err(TrySendError::Full(task)) => task,
            Err(TrySendError::Disconnected(_)) => return Err(()),
        };

        self.stats.backpressure_events.fetch_add(1, Ordering::Relaxed);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(false);
            }
            match self.sender.send_timeout(task, tick) {
                Ok(()) => {
                    self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                    return Ok(true);
                }
                Err(SendTimeoutError::Timeout(returned)) => task = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(()),
            }
        }
    }
}

/// Handle for receiving tasks from the queue
#[derive(Clone)]
pub struct WorkQueueReceiver {
    receiver: Receiver<FileTask>,
    active_workers: Arc<AtomicUsize>,
    stats: Arc<QueueStats>,
}

impl WorkQueueReceiver {
    /// Receive a task from the queue
    ///
    /// Blocks until a task is available. Returns `None` once the queue is
    /// closed and empty.
    pub fn recv(&self) -> Option<FileTask> {
        self.receiver.recv().ok()
    }

    /// Mark this worker as active
    pub fn begin_work(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark this worker as idle
    pub fn end_work(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Number of workers inside a pipeline run
    pub fn active_count(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    /// Number of tasks waiting in the queue
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

/// RAII guard for marking work as active
pub struct WorkGuard<'a> {
    receiver: &'a WorkQueueReceiver,
}

impl<'a> WorkGuard<'a> {
    /// Create a new work guard (marks worker as active)
    pub fn new(receiver: &'a WorkQueueReceiver) -> Self {
        receiver.begin_work();
        Self { receiver }
    }
}

impl<'a> Drop for WorkGuard<'a> {
    fn drop(&mut self) {
        self.receiver.end_work();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> FileTask {
        FileTask::from_path(PathBuf::from("/in").join(name)).unwrap()
    }

    #[test]
    fn test_task_from_path() {
        let t = task("a.txt");
        assert_eq!(t.filename, "a.txt");
        assert_eq!(t.path, PathBuf::from("/in/a.txt"));
        assert!(FileTask::from_path(PathBuf::from("/")).is_none());
    }

    fn send(sender: &WorkQueueSender, name: &str) -> bool {
        let running = AtomicBool::new(false);
        sender.send(task(name), &running, Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn test_queue_fifo() {
        let queue = WorkQueue::new(10);
        let (sender, receiver) = queue.split();

        send(&sender, "a.txt");
        send(&sender, "b.txt");
        assert_eq!(receiver.pending(), 2);
        assert_eq!(receiver.stats().enqueued_count(), 2);

        assert_eq!(receiver.recv().unwrap().filename, "a.txt");
        assert_eq!(receiver.recv().unwrap().filename, "b.txt");
        assert_eq!(receiver.pending(), 0);
    }

    #[test]
    fn test_blocking_send_gives_up_on_shutdown() {
        let queue = WorkQueue::new(1);
        let (sender, receiver) = queue.split();
        let shutdown = AtomicBool::new(false);

        assert!(sender.send(task("a.txt"), &shutdown, Duration::from_millis(10)).unwrap());
        assert_eq!(receiver.stats().backpressure_count(), 0);

        shutdown.store(true, Ordering::SeqCst);
        let sent = sender.send(task("b.txt"), &shutdown, Duration::from_millis(10)).unwrap();
        assert!(!sent);
        assert_eq!(receiver.pending(), 1);
        assert_eq!(receiver.stats().enqueued_count(), 1);
        assert_eq!(receiver.stats().backpressure_count(), 1);
    }

    #[test]
    fn test_blocking_send_waits_for_space() {
        let queue = WorkQueue::new(1);
        let (sender, receiver) = queue.split();
        let shutdown = Arc::new(AtomicBool::new(false));

        send(&sender, "a.txt");

        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            let first = receiver.recv().unwrap();
            let second = receiver.recv().unwrap();
            (first.filename, second.filename, receiver.stats().backpressure_count())
        });

        assert!(sender.send(task("b.txt"), &shutdown, Duration::from_millis(5)).unwrap());
        let (first, second, waits) = consumer.join().unwrap();
        assert_eq!(first, "a.txt");
        assert_eq!(second, "b.txt");
        assert_eq!(waits, 1);
    }

    #[test]
    fn test_send_on_closed_queue_fails() {
        let queue = WorkQueue::new(4);
        let (sender, receiver) = queue.split();
        drop(receiver);

        let running = AtomicBool::new(false);
        assert!(sender.send(task("a.txt"), &running, Duration::from_millis(10)).is_err());
    }

    #[test]
    fn test_close_drains_then_stops() {
        let queue = WorkQueue::new(10);
        let (sender, receiver) = queue.split();

        send(&sender, "a.txt");
        send(&sender, "b.txt");
        drop(sender);

        assert!(receiver.recv().is_some());
        assert!(receiver.recv().is_some());
        assert!(receiver.recv().is_none());
    }

    #[test]
    fn test_work_guard_tracks_active_workers() {
        let queue = WorkQueue::new(10);
        let (sender, receiver) = queue.split();
        send(&sender, "a.txt");

        let _task = receiver.recv().unwrap();
        let guard = WorkGuard::new(&receiver);
        assert_eq!(receiver.active_count(), 1);

        drop(guard);
        assert_eq!(receiver.active_count(), 0);
    }
}
