//! Scheduler throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gmp_scheduler::prelude::*;

fn runtime(nprocs: usize) -> Runtime {
    let mut rt = Runtime::new();
    rt.initialize(Some(nprocs)).unwrap();
    rt
}

fn bench_spawn_and_drain(c: &mut Criterion) {
    c.bench_function("spawn_drain_1000", |b| {
        b.iter_batched(
            || runtime(4),
            |mut rt| {
                for i in 0..1000 {
                    rt.spawn(move || {
                        black_box(i);
                    })
                    .unwrap();
                }
                black_box(rt.run_to_completion().unwrap());
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_overflow_path(c: &mut Criterion) {
    c.bench_function("spawn_overflow_10000", |b| {
        b.iter_batched(
            || runtime(1),
            |mut rt| {
                for _ in 0..10_000 {
                    rt.spawn(|| {}).unwrap();
                }
                black_box(rt.run_to_completion().unwrap());
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_steal_heavy(c: &mut Criterion) {
    c.bench_function("steal_drain_8x128", |b| {
        b.iter_batched(
            || {
                let mut rt = runtime(8);
                let scheduler = rt.scheduler_mut().unwrap();
                for pid in 1..8 {
                    for _ in 0..128 {
                        scheduler.spawn_on(ProcessorId(pid), || {}).unwrap();
                    }
                }
                rt
            },
            |mut rt| black_box(rt.run_to_completion().unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_nested_chain(c: &mut Criterion) {
    fn chain(s: &mut Scheduler, depth: usize) {
        if depth > 0 {
            s.spawn_with(move |s: &mut Scheduler| chain(s, depth - 1)).unwrap();
        }
    }

    c.bench_function("nested_chain_1000", |b| {
        b.iter_batched(
            || runtime(2),
            |mut rt| {
                rt.spawn_with(|s: &mut Scheduler| chain(s, 1000)).unwrap();
                black_box(rt.run_to_completion().unwrap());
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_spawn_and_drain,
    bench_overflow_path,
    bench_steal_heavy,
    bench_nested_chain
);
criterion_main!(benches);
