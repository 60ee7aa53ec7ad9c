//! Recall quality validation: HNSW search results are compared against the
//! flat index oracle on a uniform-random dataset (spec.md §8 testable
//! property 8: recall@10 >= 0.90 on 10,000 128-d vectors with
//! `M=16, ef_search=100`).

use std::collections::HashSet;
use vekto_core::config::HnswConfig;
use vekto_core::distance::DistanceMetric;
use vekto_core::index::flat::FlatIndex;
use vekto_core::index::hnsw::HnswIndex;
use vekto_core::index::Index;

/// A cheap deterministic pseudo-random vector generator: uniform in
/// `[0, 1)` per dimension, seeded by index so datasets are reproducible
/// across test runs without pulling `rand` into this particular test.
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

#[test]
fn hnsw_recall_at_10_meets_the_spec_floor_on_10k_128d_vectors() {
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

    let queries: Vec<Vec<f32>> = (0..100).map(|i| generate_vector(dim, 5_000_000 + i)).collect();
    let recall = recall_at_k(&hnsw, &flat, &queries, 10);

    assert!(recall >= 0.90, "recall@10 was {recall}, expected >= 0.90");
}

#[test]
fn flat_index_is_self_consistent_as_the_oracle() {
    let dim = 16;
    let flat = FlatIndex::new(dim, DistanceMetric::L2);
    for i in 0..200 {
        flat.insert(&i.to_string(), &generate_vector(dim, i as u64)).unwrap();
    }

    for i in (0..200).step_by(37) {
        let vector = generate_vector(dim, i as u64);
        let hits = flat.search(&vector, 1).unwrap();
        assert_eq!(hits[0].id, i.to_string());
        assert!(hits[0].distance < 1e-6);
    }
}

#[test]
fn higher_ef_search_never_decreases_recall() {
    let dim = 32;
    let n = 2_000;
    let flat = FlatIndex::new(dim, DistanceMetric::Cosine);
    let vectors: Vec<Vec<f32>> = (0..n).map(|i| generate_vector(dim, i as u64)).collect();
    for (i, vector) in vectors.iter().enumerate() {
        flat.insert(&i.to_string(), vector).unwrap();
    }
    let queries: Vec<Vec<f32>> = (0..30).map(|i| generate_vector(dim, 9_000_000 + i)).collect();

    let mut previous_recall = 0.0;
    for ef_search in [16, 64, 256] {
        let hnsw = HnswIndex::new(
            dim,
            HnswConfig {
                m: 16,
                ef_construction: 200,
                ef_search,
                metric: DistanceMetric::Cosine,
                ..Default::default()
            },
        );
        for (i, vector) in vectors.iter().enumerate() {
            hnsw.insert(&i.to_string(), vector).unwrap();
        }
        let recall = recall_at_k(&hnsw, &flat, &queries, 10);
        assert!(
            recall >= previous_recall - 0.05,
            "recall regressed sharply at ef_search={ef_search}: {recall} < {previous_recall}"
        );
        previous_recall = recall;
    }
}
