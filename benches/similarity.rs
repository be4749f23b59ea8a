//! Performance benchmarks for scoring and matching.
//!
//! Run with: `cargo bench --bench similarity`
//!
//! ## What is measured
//!
//! | Benchmark | Shape | Notes |
//! |-----------|-------|-------|
//! | `score/wide` | one object, N scalar properties | Breadth of the FIFO walk |
//! | `score/deep` | nested objects, depth N | Depth of the FIFO walk |
//! | `score/capped` | wide object, cap 32 | Property cap short-circuit |
//! | `perfect_match` | N exact duplicates | Hash-bucketed equality |
//! | `compare/workers` | 200 × 200 near-duplicates | 1 worker vs in-process spokes |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use heap_reconciler::{
    find_perfect_matches, score, CompareOptions, ObjectComparator, ObjectValue, Record, Value,
};

/// Object with `width` numeric properties, the last one offset by `delta`.
fn wide(width: usize, delta: i64) -> Value {
    let mut object = ObjectValue::new("Wide");
    for i in 0..width {
        let v = if i + 1 == width { i as i64 + delta } else { i as i64 };
        object = object.with(format!("p{i}"), v);
    }
    object.into()
}

/// Chain of `depth` nested objects with a leaf at the bottom.
fn deep(depth: usize, leaf: &str) -> Value {
    (0..depth).fold(Value::from(leaf), |inner, level| {
        ObjectValue::new("Node")
            .with("level", level as i64)
            .with("child", inner)
            .into()
    })
}

fn population(offset: i64, n: i64, salt: i64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let value = Value::object(
                "Item",
                [
                    ("kind", Value::from(i % 7)),
                    ("size", Value::from(i % 13)),
                    ("flag", Value::from(i % 2 == 0)),
                    ("name", Value::from(format!("item-{}", (i + salt) % 50))),
                ],
            );
            Record::new(offset + i, value)
        })
        .collect()
}

/// Benchmark scoring a single pair of values.
fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    for width in [10, 100, 1000] {
        let lhs = wide(width, 0);
        let rhs = wide(width, 1);

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::new("wide", width), &(lhs, rhs), |b, (lhs, rhs)| {
            b.iter(|| score(black_box(lhs), black_box(rhs), None))
        });
    }

    for depth in [8, 64, 256] {
        let lhs = deep(depth, "a");
        let rhs = deep(depth, "b");

        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("deep", depth), &(lhs, rhs), |b, (lhs, rhs)| {
            b.iter(|| score(black_box(lhs), black_box(rhs), None))
        });
    }

    let lhs = wide(1000, 0);
    let rhs = wide(1000, 1);
    group.bench_function("capped", |b| {
        b.iter(|| score(black_box(&lhs), black_box(&rhs), Some(32)))
    });

    group.finish();
}

/// Benchmark the exact-duplicate phase.
fn bench_perfect_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("perfect_match");

    for n in [100, 1000] {
        let current = population(0, n, 0);
        let next = population(10_000, n, 0);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(
            BenchmarkId::new("records", n),
            &(current, next),
            |b, (current, next)| {
                b.iter(|| find_perfect_matches(black_box(current.clone()), black_box(next.clone())))
            },
        );
    }

    group.finish();
}

/// Benchmark the full object pipeline with and without spokes.
fn bench_compare_workers(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");

    // Salted names defeat the perfect phase so every pair is scored.
    let current = population(0, 200, 0);
    let next = population(1_000, 200, 3);

    let mut group = c.benchmark_group("compare");
    group.sample_size(10);

    for workers in [1, 4] {
        let comparator = ObjectComparator::new(
            CompareOptions::default().with_threshold(0.5).with_workers(workers),
        );

        group.bench_with_input(BenchmarkId::new("workers", workers), &comparator, |b, comparator| {
            b.iter(|| {
                runtime.block_on(comparator.compare(black_box(current.clone()), black_box(next.clone())))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_score,
    bench_perfect_match,
    bench_compare_workers,
);
criterion_main!(benches);
