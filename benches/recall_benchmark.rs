//! Measures HNSW recall@10 against the flat index oracle on a uniform
//! random dataset, reporting it as a Criterion throughput-style metric
//! rather than pass/fail (see `tests/recall_validation.rs` for the
//! pass/fail assertion, spec.md §8 testable property 8).
//!
//! Run with: `cargo bench --bench recall_benchmark`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashSet;
use vekto_core::config::HnswConfig;
use vekto_core::distance::DistanceMetric;
use vekto_core::index::flat::FlatIndex;
use vekto_core::index::hnsw::HnswIndex;
use vekto_core::index::Index;

fn generate_vector(dim: usize, seed: u64) -> Vec<f32> {
    (0..dim)
        .map(|i| (((seed.wrapping_mul(2_654_435_761)).wrapping_add(i as u64) % 10_000) as f32) / 10_000.0)
        .collect()
}

fn recall_at_k(hnsw: &HnswIndex, flat: &FlatIndex, queries: &[Vec<f32>], k: usize) -> f64 {
    let mut total = 0.0;
    for query in queries {
        let truth: HashSet<String> = flat.search(query, k).unwrap().into_iter().map(|n| n.id).collect();
        let got: HashSet<String> = hnsw.search(query, k).unwrap().into_iter().map(|n| n.id).collect();
        total += truth.intersection(&got).count() as f64 / k as f64;
    }
    total / queries.len() as f64
}

fn bench_recall_at_10(c: &mut Criterion) {
    let dim = 128;
    let n = 10_000;

    let hnsw = HnswIndex::new(
        dim,
        HnswConfig {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            metric: DistanceMetric::Cosine,
            ..Default::default()
        },
    );
    let flat = FlatIndex::new(dim, DistanceMetric::Cosine);

    for i in 0..n {
        let vector = generate_vector(dim, i as u64);
        hnsw.insert(&i.to_string(), &vector).unwrap();
        flat.insert(&i.to_string(), &vector).unwrap();
    }

    let queries: Vec<Vec<f32>> = (0..50).map(|i| generate_vector(dim, 1_000_000 + i)).collect();

    c.bench_function("recall_at_10_10k_vectors_128d", |b| {
        b.iter(|| black_box(recall_at_k(&hnsw, &flat, &queries, 10)));
    });
}

criterion_group!(benches, bench_recall_at_10);
criterion_main!(benches);
