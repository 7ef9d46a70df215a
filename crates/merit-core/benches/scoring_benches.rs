//! Criterion benchmarks for merit-core hot paths.
//!
//! Covers: EWMA updates, decay, tier resolution, and window aggregation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use merit_core::constants::{DEFAULT_ALPHA, DEFAULT_DECAY_FACTOR, DEFAULT_LIKE_WEIGHT};
use merit_core::scoring::{decay_score, ewma_update};
use merit_core::tier::TierTable;

fn bench_ewma_update(c: &mut Criterion) {
    c.bench_function("ewma_update", |b| {
        b.iter(|| {
            ewma_update(
                black_box(1000),
                black_box(DEFAULT_LIKE_WEIGHT),
                black_box(DEFAULT_ALPHA),
            )
        })
    });
}

fn bench_decay_score(c: &mut Criterion) {
    c.bench_function("decay_score", |b| {
        b.iter(|| decay_score(black_box(810), black_box(DEFAULT_DECAY_FACTOR)))
    });
}

fn bench_tier_resolve(c: &mut Criterion) {
    let tiers = TierTable::default();
    // Mid-table score so resolution walks past two cutoffs.
    c.bench_function("tier_resolve", |b| {
        b.iter(|| tiers.resolve(black_box(1_650)))
    });
}

fn bench_window_aggregation(c: &mut Criterion) {
    // Sum-per-user over a window of 10k deltas across 100 users, the shape
    // of an anomaly scan.
    let deltas: Vec<(u64, i64)> = (0..10_000)
        .map(|i| (i % 100, if i % 7 == 0 { -190 } else { 50 }))
        .collect();

    c.bench_function("window_aggregation_10k", |b| {
        b.iter(|| {
            let mut totals = std::collections::HashMap::<u64, i64>::new();
            for &(user_id, delta) in black_box(&deltas) {
                *totals.entry(user_id).or_insert(0) += delta;
            }
            totals
        })
    });
}

criterion_group!(
    benches,
    bench_ewma_update,
    bench_decay_score,
    bench_tier_resolve,
    bench_window_aggregation,
);
criterion_main!(benches);
