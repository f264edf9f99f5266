use criterion::{black_box, criterion_group, criterion_main, Criterion};
use state_handoff::{GuardedDoubleBuffer, LockFreeDoubleBuffer, LockFreeTripleBuffer};

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Run a benchmark while an antagonist thread hammers the same buffer
fn under_contention<R>(
    mut antagonist: impl FnMut() + Send,
    benchmark: impl FnOnce() -> R,
) -> R {
    let stop = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                antagonist();
            }
        });
        let result = benchmark();
        stop.store(true, Ordering::Relaxed);
        result
    })
}

pub fn triple_buffer(c: &mut Criterion) {
    let (mut input, mut output) = LockFreeTripleBuffer::<u8>::default().split();
    {
        let mut uncontended = c.benchmark_group("triple/uncontended");
        uncontended.bench_function("clean read", |b| {
            b.iter(|| *black_box(output.read().0))
        });
        uncontended.bench_function("write", |b| {
            b.iter(|| {
                *input.write() = black_box(0);
                input.commit()
            })
        });
        uncontended.bench_function("write + dirty read", |b| {
            b.iter(|| {
                input.publish(black_box(0));
                *black_box(output.read().0)
            })
        });
    }
    {
        let mut read_contended = c.benchmark_group("triple/read contention");
        under_contention(
            || {
                black_box(*output.read().0);
            },
            || {
                read_contended.bench_function("write", |b| {
                    b.iter(|| input.publish(black_box(0)))
                });
            },
        );
    }
    {
        let mut write_contended = c.benchmark_group("triple/write contention");
        under_contention(
            || input.publish(black_box(0)),
            || {
                write_contended.bench_function("read", |b| {
                    b.iter(|| *black_box(output.read().0))
                });
            },
        );
    }
}

pub fn lock_free_double_buffer(c: &mut Criterion) {
    let (mut input, mut output) = LockFreeDoubleBuffer::<u8>::default().split();
    {
        let mut uncontended = c.benchmark_group("double/uncontended");
        uncontended.bench_function("clean read", |b| {
            b.iter(|| *black_box(output.read().0))
        });
        uncontended.bench_function("write", |b| {
            b.iter(|| input.publish(black_box(0)))
        });
        uncontended.bench_function("write + dirty read", |b| {
            b.iter(|| {
                input.publish(black_box(0));
                *black_box(output.read().0)
            })
        });
    }
    {
        let mut read_contended = c.benchmark_group("double/read contention");
        under_contention(
            || {
                black_box(*output.read().0);
            },
            || {
                read_contended.bench_function("write", |b| {
                    b.iter(|| input.publish(black_box(0)))
                });
            },
        );
    }
    {
        let mut write_contended = c.benchmark_group("double/write contention");
        under_contention(
            || input.publish(black_box(0)),
            || {
                write_contended.bench_function("read", |b| {
                    b.iter(|| *black_box(output.read().0))
                });
            },
        );
    }
}

pub fn guarded_double_buffer(c: &mut Criterion) {
    let buf = GuardedDoubleBuffer::<u8>::default();
    let write_and_swap = || {
        *buf.acquire_for_write() = black_box(0);
        buf.swap_buffers();
    };
    {
        let mut uncontended = c.benchmark_group("guarded/uncontended");
        uncontended.bench_function("read", |b| {
            b.iter(|| *black_box(&*buf.acquire_for_read()))
        });
        uncontended.bench_function("write + swap", |b| b.iter(write_and_swap));
    }
    {
        let mut read_contended = c.benchmark_group("guarded/read contention");
        under_contention(
            || {
                black_box(*buf.acquire_for_read());
            },
            || {
                read_contended.bench_function("write + swap", |b| b.iter(write_and_swap));
            },
        );
    }
    {
        let mut write_contended = c.benchmark_group("guarded/write contention");
        under_contention(write_and_swap, || {
            write_contended.bench_function("read", |b| {
                b.iter(|| *black_box(&*buf.acquire_for_read()))
            });
        });
    }
}

criterion_group!(
    benches,
    triple_buffer,
    lock_free_double_buffer,
    guarded_double_buffer
);
criterion_main!(benches);
