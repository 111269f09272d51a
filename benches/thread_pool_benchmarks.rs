use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use fifo_pool::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn benchmark_thread_pool_creation(c: &mut Criterion) {
    c.bench_function("thread_pool_creation", |b| {
        b.iter(|| {
            let pool = ThreadPool::with_threads(4).expect("Failed to create pool");
            pool.shutdown().expect("Failed to shutdown pool");
        });
    });
}

fn benchmark_job_submission(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_submission");

    group.bench_function("enqueue_100", |b| {
        b.iter_batched(
            || ThreadPool::with_threads(4).expect("Failed to create pool"),
            |pool| {
                for _ in 0..100 {
                    pool.enqueue(|| {
                        black_box(1 + 1);
                    })
                    .expect("Failed to submit job");
                }
                pool.shutdown().expect("Failed to shutdown pool");
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("submit_and_get_100", |b| {
        b.iter_batched(
            || ThreadPool::with_threads(4).expect("Failed to create pool"),
            |pool| {
                let handles: Vec<_> = (0..100u64)
                    .map(|i| {
                        pool.submit(move || {
                            let mut sum = 0u64;
                            for j in 0..1000 {
                                sum = sum.wrapping_add(i * j);
                            }
                            sum
                        })
                        .expect("Failed to submit job")
                    })
                    .collect();
                for handle in handles {
                    black_box(handle.join().expect("job failed"));
                }
                pool.shutdown().expect("Failed to shutdown pool");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_concurrent_submission(c: &mut Criterion) {
    c.bench_function("concurrent_submission_4_threads", |b| {
        b.iter_batched(
            || Arc::new(ThreadPool::with_threads(4).expect("Failed to create pool")),
            |pool| {
                let handles: Vec<_> = (0..4)
                    .map(|_| {
                        let pool = Arc::clone(&pool);
                        std::thread::spawn(move || {
                            for _ in 0..25 {
                                pool.execute(|| Ok(())).expect("Failed to submit job");
                            }
                        })
                    })
                    .collect();

                for handle in handles {
                    handle.join().expect("Thread panicked");
                }

                pool.shutdown().expect("Failed to shutdown pool");
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("tasks_per_second", |b| {
        b.iter_batched(
            || {
                let pool = ThreadPool::with_threads(8).expect("Failed to create pool");
                let counter = Arc::new(AtomicU64::new(0));
                (pool, counter)
            },
            |(pool, counter)| {
                for _ in 0..1000 {
                    let counter = Arc::clone(&counter);
                    pool.enqueue(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    })
                    .expect("Failed to submit job");
                }

                pool.shutdown().expect("Failed to shutdown pool");

                let total = counter.load(Ordering::Relaxed);
                assert_eq!(total, 1000, "Not all tasks completed");
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_thread_pool_creation,
    benchmark_job_submission,
    benchmark_concurrent_submission,
    benchmark_throughput
);
criterion_main!(benches);
