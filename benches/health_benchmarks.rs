//! Health core benchmarks
//!
//! Benchmarks for the per-cycle hot paths:
//! - Guardrail evaluation across many experiments
//! - Pairwise collision detection on growing calendars
//! - SRM chi-squared check
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trueno_guard::collision::detect_collisions;
use trueno_guard::config::HealthConfig;
use trueno_guard::experiment::{ScheduledExperiment, VariantAllocation};
use trueno_guard::feed::MemoryMetricFeed;
use trueno_guard::guardrail::{Action, Condition, GuardrailRule};
use trueno_guard::monitor::HealthMonitor;
use trueno_guard::sink::RecordingSink;
use trueno_guard::srm::check_srm;

const LOCALES: [&str; 4] = ["EU", "US", "APAC", "LATAM"];
const AUDIENCES: [&str; 3] = ["new", "returning", "all"];

/// Random calendar of `n` experiments over one year
fn random_schedule(n: usize, rng: &mut StdRng) -> Vec<ScheduledExperiment> {
    let year_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..n)
        .map(|i| {
            let start = year_start + Duration::days(rng.gen_range(0..330));
            let end = start + Duration::days(rng.gen_range(7..35));
            ScheduledExperiment::builder(format!("exp-{i:05}"), start, end)
                .locale(LOCALES[rng.gen_range(0..LOCALES.len())])
                .audience_key(AUDIENCES[rng.gen_range(0..AUDIENCES.len())])
                .build()
                .unwrap()
        })
        .collect()
}

/// Monitor with 4 rules per experiment and fresh values for each
fn monitor_with_rules(experiments: usize, parallel: bool) -> (HealthMonitor, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(42);
    let feed = Arc::new(MemoryMetricFeed::new());
    let config = HealthConfig::builder().parallel(parallel).build().unwrap();
    let monitor = HealthMonitor::builder()
        .config(config)
        .metric_feed(feed.clone())
        .action_sink(Arc::new(RecordingSink::new()))
        .build()
        .unwrap();

    let now = Utc::now();
    let ids: Vec<String> = (0..experiments).map(|i| format!("exp-{i:05}")).collect();
    for id in &ids {
        for metric in ["bounce_rate", "latency_ms", "error_rate", "revenue_per_user"] {
            monitor
                .add_rule(
                    GuardrailRule::builder(format!("{id}-{metric}"), id, metric)
                        .when(Condition::Above, 50.0)
                        .action(Action::Alert)
                        .cooldown_hours(24.0)
                        .build()
                        .unwrap(),
                )
                .unwrap();
            feed.record(id, metric, rng.gen_range(0.0..100.0), now);
        }
    }
    (monitor, ids)
}

/// Benchmark one guardrail cycle, sequential vs parallel
fn bench_guardrail_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("guardrail_cycle");

    for size in [10, 100, 1_000].iter() {
        for parallel in [false, true] {
            let (monitor, ids) = monitor_with_rules(*size, parallel);
            let now = Utc::now();
            let label = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(label, size), size, |b, _| {
                b.iter(|| black_box(monitor.run_cycle(&ids, now)));
            });
        }
    }

    group.finish();
}

/// Benchmark collision detection (quadratic in calendar size)
fn bench_collision_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("collision_detection");
    let mut rng = StdRng::seed_from_u64(7);

    for size in [50, 200, 1_000].iter() {
        let schedule = random_schedule(*size, &mut rng);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(detect_collisions(&schedule)));
        });
    }

    group.finish();
}

/// Benchmark the SRM check for 2 to 16 variants
#[allow(clippy::cast_precision_loss)]
fn bench_srm(c: &mut Criterion) {
    let mut group = c.benchmark_group("srm_check");
    let mut rng = StdRng::seed_from_u64(11);

    for variants in [2_usize, 4, 16].iter() {
        let share = 1.0 / *variants as f64;
        let allocations: Vec<VariantAllocation> = (0..*variants)
            .map(|i| VariantAllocation::new(format!("v{i}"), share, rng.gen_range(9_000..11_000)))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(variants), variants, |b, _| {
            b.iter(|| black_box(check_srm(&allocations).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_guardrail_cycle,
    bench_collision_detection,
    bench_srm
);
criterion_main!(benches);
