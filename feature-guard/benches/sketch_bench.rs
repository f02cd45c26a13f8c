use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use feature_guard::prelude::*;
use feature_guard::sketches::{DistinctSketch, KllSketch, TopKSketch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn benchmark_kll_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("kll_update");

    for k in [100, 200, 500].iter() {
        for n in [10_000, 100_000].iter() {
            group.throughput(Throughput::Elements(*n as u64));

            group.bench_with_input(
                BenchmarkId::from_parameter(format!("k{k}_n{n}")),
                &(*k, *n),
                |b, &(k, n)| {
                    b.iter(|| {
                        let mut sketch = KllSketch::new(k);
                        for i in 0..n {
                            sketch.update(std::hint::black_box(i as f64));
                        }
                        sketch
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_kll_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("kll_merge");

    for k in [200, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(format!("k{k}")), k, |b, &k| {
            b.iter_batched(
                || {
                    let mut left = KllSketch::new(k);
                    let mut right = KllSketch::new(k);
                    for i in 0..50_000 {
                        left.update(i as f64);
                        right.update((i + 50_000) as f64);
                    }
                    (left, right)
                },
                |(mut left, right)| {
                    left.merge(&right).unwrap();
                    left
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn benchmark_top_k_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("top_k_update");
    let mut rng = StdRng::seed_from_u64(42);
    // Skewed stream: a few heavy hitters over a long tail.
    let values: Vec<String> = (0..100_000)
        .map(|_| {
            let v: u32 = rng.random_range(0..10_000);
            format!("value-{}", v * v / 10_000)
        })
        .collect();

    for capacity in [100, 1000].iter() {
        group.throughput(Throughput::Elements(values.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("capacity{capacity}")),
            capacity,
            |b, &capacity| {
                b.iter(|| {
                    let mut sketch = TopKSketch::new(capacity);
                    for v in &values {
                        sketch.update(std::hint::black_box(v));
                    }
                    sketch
                });
            },
        );
    }

    group.finish();
}

fn benchmark_distinct_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("distinct_update");
    let values: Vec<String> = (0..100_000).map(|i| format!("user-{i}")).collect();
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("k1024", |b| {
        b.iter(|| {
            let mut sketch = DistinctSketch::new(1024);
            for v in &values {
                sketch.update(std::hint::black_box(v));
            }
            sketch.estimate()
        });
    });

    group.finish();
}

fn benchmark_compute_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_statistics");
    let mut rng = StdRng::seed_from_u64(7);
    let examples: Vec<Example> = (0..20_000)
        .map(|_| {
            Example::new()
                .with("fare", [rng.random_range(2.5..80.0)])
                .with("payment_type", [["Cash", "Credit Card", "No Charge"][rng.random_range(0..3)]])
                .with("pickup_community_area", [rng.random_range(1i64..78)])
        })
        .collect();
    group.throughput(Throughput::Elements(examples.len() as u64));

    group.bench_function("single_pass", |b| {
        b.iter(|| compute_statistics(&examples, &StatsOptions::default()).unwrap());
    });

    group.bench_function("sharded_merge", |b| {
        b.iter(|| {
            let shards: Vec<DatasetStatistics> = examples
                .chunks(2_000)
                .map(|chunk| compute_statistics(chunk, &StatsOptions::default()).unwrap())
                .collect();
            DatasetStatistics::merge_all(&shards).unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_kll_update,
    benchmark_kll_merge,
    benchmark_top_k_update,
    benchmark_distinct_update,
    benchmark_compute_statistics
);
criterion_main!(benches);
