//! Reconciliation Benchmarks — Hot-Path Performance Validation
//!
//! Benchmarks the domain functions that run on every quote of every
//! cycle. Reconciliation is in-memory arithmetic and must stay cheap
//! relative to the network I/O that feeds it.
//!
//! Run with: cargo bench --bench reconcile_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chrono::Utc;
use rust_decimal_macros::dec;

use pricefeed_engine::domain::reconcile::{change_pct, classify};
use pricefeed_engine::domain::synthetic::SyntheticGenerator;

/// Benchmark delta percentage computation with clamping.
fn bench_change_pct(c: &mut Criterion) {
    c.bench_function("change_pct_typical", |b| {
        b.iter(|| {
            let _pct = change_pct(black_box(dec!(1350.00)), black_box(dec!(45000.00)));
        });
    });

    c.bench_function("change_pct_clamped", |b| {
        b.iter(|| {
            let _pct = change_pct(black_box(dec!(1000000)), black_box(dec!(0.0001)));
        });
    });
}

/// Benchmark movement classification.
fn bench_classify(c: &mut Criterion) {
    c.bench_function("classify_movement", |b| {
        b.iter(|| {
            let _m = classify(black_box(dec!(-12.50)));
        });
    });
}

/// Benchmark one synthetic quote generation (seeded walk).
fn bench_synthetic_quote(c: &mut Criterion) {
    let generator = SyntheticGenerator::default();
    let symbol = "BTC".to_string();
    let now = Utc::now();

    c.bench_function("synthetic_quote", |b| {
        let mut cycle = 0u64;
        b.iter(|| {
            cycle += 1;
            let _q = generator.generate(
                black_box(&symbol),
                black_box(dec!(45000.00)),
                black_box(cycle),
                now,
            );
        });
    });
}

criterion_group!(benches, bench_change_pct, bench_classify, bench_synthetic_quote);
criterion_main!(benches);
