//! Benchmarks for filedrop
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

fn benchmark_queue_operations(c: &mut Criterion) {
    use filedrop::pipeline::queue::{FileTask, WorkQueue};

    c.bench_function("queue_send_recv", |b| {
        let (sender, receiver) = WorkQueue::new(10000).split();
        let shutdown = AtomicBool::new(false);
        let task = FileTask::from_path(PathBuf::from("/input/test_file.txt")).unwrap();

        b.iter(|| {
            sender
                .send(task.clone(), &shutdown, Duration::from_millis(10))
                .unwrap();
            let received = receiver.recv().unwrap();
            black_box(received);
        })
    });
}

fn benchmark_lock_table(c: &mut Criterion) {
    use filedrop::lock::FileLockTable;

    c.bench_function("lock_acquire_release", |b| {
        let table = FileLockTable::new();

        b.iter(|| {
            let guard = table.acquire(black_box("test_20240101_120000_000.txt"));
            black_box(&guard);
        })
    });
}

fn benchmark_naming(c: &mut Criterion) {
    use filedrop::artifact::Naming;

    c.bench_function("artifact_names", |b| {
        let naming = Naming::new("txt");

        b.iter(|| {
            let name = black_box("test_20240101_120000_000.txt");
            if naming.matches(name) {
                black_box(naming.artifacts(name));
            }
        })
    });
}

criterion_group!(benches, benchmark_queue_operations, benchmark_lock_table, benchmark_naming);
criterion_main!(benches);
