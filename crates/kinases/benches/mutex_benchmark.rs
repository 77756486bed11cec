use criterion::async_executor::FuturesExecutor;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use kinases::{Identity, Lock};
use std::{
    cell::UnsafeCell,
    hint::black_box,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, available_parallelism},
};

/// A plain value behind a `Lock`, standing in for whatever state a real caller would
/// protect -- `Lock` itself only tracks ownership, it doesn't wrap a value.
struct Guarded {
    lock: Lock,
    value: UnsafeCell<i32>,
}

unsafe impl Sync for Guarded {}

impl Guarded {
    fn new() -> Self {
        Self {
            lock: Lock::new(),
            value: UnsafeCell::new(0),
        }
    }

    fn with_blocking(&self, identity: Identity, f: impl FnOnce(&mut i32)) {
        let _guard = self.lock.blocking_acquire(identity, None).unwrap();
        f(unsafe { &mut *self.value.get() });
    }

    async fn with_async(&self, identity: Identity, f: impl FnOnce(&mut i32)) {
        let _guard = self.lock.async_acquire(identity, None, false).await.unwrap();
        f(unsafe { &mut *self.value.get() });
    }
}

fn bump_and_reset(value: &mut i32) {
    assert_eq!(*value, 0);
    *value += 1;
    assert_eq!(*value, 1);
    *value = 0;
    assert_eq!(*value, 0);
}

fn use_lock(guarded: &Guarded) {
    guarded.with_blocking(Identity::current_thread(), bump_and_reset);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Lock blocking acquire with threads");

    let machine_thread_count = available_parallelism().map(|n| n.get()).unwrap_or(16);
    for thread_count in [0, 2, 4, machine_thread_count] {
        group.bench_function(
            &format!("lock acquire with {} contention threads", thread_count),
            |b| {
                let g = Arc::new(Guarded::new());
                let stop = Arc::new(AtomicBool::new(false));

                let mut thread_joins = Vec::new();
                for _ in 0..thread_count {
                    let g = g.clone();
                    let stop = stop.clone();
                    thread_joins.push(thread::spawn(move || {
                        let identity = Identity::current_thread();
                        while !stop.load(Ordering::Relaxed) {
                            g.with_blocking(identity, bump_and_reset);
                        }
                    }));
                }

                b.iter_batched(
                    || g.clone(),
                    |g| use_lock(black_box(&g)),
                    BatchSize::SmallInput,
                );

                stop.store(true, Ordering::SeqCst);
                for thread in thread_joins {
                    thread.join().unwrap();
                }
            },
        );
    }

    group.finish();

    let mut group = c.benchmark_group("Lock async acquire with threads");
    let next_task_id = Arc::new(AtomicU64::new(1));

    for thread_count in [0, 2, 4, machine_thread_count] {
        group.bench_function(
            &format!("async lock acquire with {} contention threads", thread_count),
            |b| {
                let g = Arc::new(Guarded::new());
                let stop = Arc::new(AtomicBool::new(false));

                let mut thread_joins = Vec::new();
                for _ in 0..thread_count {
                    let g = g.clone();
                    let stop = stop.clone();
                    let next_task_id = next_task_id.clone();
                    thread_joins.push(thread::spawn(move || {
                        let identity = Identity::task(next_task_id.fetch_add(1, Ordering::Relaxed));
                        futures::executor::block_on(async move {
                            while !stop.load(Ordering::Relaxed) {
                                g.with_async(identity, bump_and_reset).await;
                            }
                        });
                    }));
                }

                let bench_task_id = next_task_id.clone();
                b.to_async(FuturesExecutor).iter_batched(
                    || (g.clone(), Identity::task(bench_task_id.fetch_add(1, Ordering::Relaxed))),
                    |(g, identity)| async move {
                        g.with_async(identity, bump_and_reset).await;
                    },
                    BatchSize::SmallInput,
                );

                stop.store(true, Ordering::SeqCst);
                for thread in thread_joins {
                    thread.join().unwrap();
                }
            },
        );
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
