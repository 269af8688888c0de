//! Criterion benchmarks for HypoLab hot paths.
//!
//! Benchmarks:
//! 1. Simulator bar loop under each exit model
//! 2. Signal generation for the built-in single-series hypothesis
//! 3. Year concatenation of a multi-year series

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use hypolab_core::data::{synthetic_series, InMemorySource};
use hypolab_core::domain::{Interval, ParameterSet, TimeSeries};
use hypolab_core::engine::Simulator;
use hypolab_core::exit::ExitModelSpec;
use hypolab_core::signals::{GreenNearLowHigh, SignalContext, SignalSource};

// ── Helpers ──────────────────────────────────────────────────────────

fn every_nth(series: &TimeSeries, n: usize) -> Vec<bool> {
    (0..series.len()).map(|i| i % n == 0).collect()
}

// ── 1. Simulator ─────────────────────────────────────────────────────

fn bench_simulator(c: &mut Criterion) {
    let series = synthetic_series("BTCUSDT", Interval::H1, &[2023, 2024]);
    let signals = every_nth(&series, 25);
    let sim = Simulator::frictionless();

    let models = [
        ExitModelSpec::fixed_tpsl(2.0, 1.0),
        ExitModelSpec::trailing_stop(1.5),
        ExitModelSpec::time_based(48.0),
        ExitModelSpec::combo(2.0, 1.0, 48.0),
    ];

    let mut group = c.benchmark_group("simulator");
    for spec in models.into_iter().flatten() {
        group.bench_with_input(
            BenchmarkId::from_parameter(spec.model_name()),
            &spec,
            |b, spec| b.iter(|| sim.run(black_box(&series), black_box(&signals), spec)),
        );
    }
    group.finish();
}

// ── 2. Signals ───────────────────────────────────────────────────────

fn bench_signals(c: &mut Criterion) {
    let series = synthetic_series("ETHUSDT", Interval::H1, &[2024]);
    let source = InMemorySource::new();
    let ctx = SignalContext::for_series(&source, &series);
    let params = ParameterSet::new();

    c.bench_function("green_near_low_high_1y_1h", |b| {
        b.iter(|| GreenNearLowHigh.generate_signals(black_box(&series), &ctx, &params))
    });
}

// ── 3. Year concatenation ────────────────────────────────────────────

fn bench_concat(c: &mut Criterion) {
    let series = synthetic_series("BTCUSDT", Interval::M15, &[2022, 2023, 2024]);
    let by_year = series.split_by_year();
    let years: BTreeSet<i32> = by_year.keys().copied().collect();

    c.bench_function("concat_3y_15m", |b| {
        b.iter(|| TimeSeries::concat_years(black_box(&by_year), &years))
    });
}

criterion_group!(benches, bench_simulator, bench_signals, bench_concat);
criterion_main!(benches);
