//! HNSW index insertion and search benchmarks.
//!
//! Run with: `cargo bench --bench hnsw_benchmark`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vekto_core::config::HnswConfig;
use vekto_core::distance::DistanceMetric;
use vekto_core::index::hnsw::HnswIndex;
use vekto_core::index::Index;

/// Deterministic pseudo-random vector, cheap enough to regenerate per
/// benchmark iteration without skewing the measured operation.
fn generate_vector(dim: usize, seed: u64) -> Vec<f32> {
    (0..dim)
        .map(|i| ((seed as f32 * 0.1 + i as f32 * 0.01).sin() + 1.0) / 2.0)
        .collect()
}

fn config(metric: DistanceMetric) -> HnswConfig {
    HnswConfig {
        m: 16,
        ef_construction: 200,
        ef_search: 64,
        metric,
        ..Default::default()
    }
}

fn bench_hnsw_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_insert");
    let dim = 128;

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("vectors", format!("{count}x{dim}d")),
            &count,
            |b, &count| {
                b.iter(|| {
                    let index = HnswIndex::new(dim, config(DistanceMetric::Cosine));
                    for i in 0..count {
                        let vector = generate_vector(dim, i as u64);
                        index.insert(&i.to_string(), &vector).unwrap();
                    }
                    black_box(index.stats().live_count)
                });
            },
        );
    }
    group.finish();
}

fn bench_hnsw_search_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_search_latency");

    let dim = 128;
    let index = HnswIndex::new(dim, config(DistanceMetric::Cosine));
    for i in 0..10_000 {
        let vector = generate_vector(dim, i);
        index.insert(&i.to_string(), &vector).unwrap();
    }
    let query = generate_vector(dim, 99_999);

    for k in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("top_k", k), &k, |b, &k| {
            b.iter(|| black_box(index.search(&query, k).unwrap()));
        });
    }
    group.finish();
}

fn bench_hnsw_search_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("hnsw_search_throughput");

    let dim = 128;
    let index = HnswIndex::new(dim, config(DistanceMetric::Cosine));
    for i in 0..10_000 {
        let vector = generate_vector(dim, i);
        index.insert(&i.to_string(), &vector).unwrap();
    }
    let queries: Vec<Vec<f32>> = (0..100).map(|i| generate_vector(dim, 100_000 + i)).collect();

    group.throughput(Throughput::Elements(queries.len() as u64));
    group.bench_function("100_queries_top10", |b| {
        b.iter(|| {
            for query in &queries {
                black_box(index.search(query, 10).unwrap());
            }
        });
    });
    group.finish();
}

fn bench_distance_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_metrics");

    let dim = 128;
    let query = generate_vector(dim, 0);

    for metric in [DistanceMetric::Cosine, DistanceMetric::L2, DistanceMetric::InnerProduct] {
        let index = HnswIndex::new(dim, config(metric));
        for i in 0..5_000 {
            let vector = generate_vector(dim, i);
            index.insert(&i.to_string(), &vector).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("search", format!("{metric:?}")), &metric, |b, _| {
            b.iter(|| black_box(index.search(&query, 10).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_hnsw_insert,
    bench_hnsw_search_latency,
    bench_hnsw_search_throughput,
    bench_distance_metrics
);
criterion_main!(benches);
