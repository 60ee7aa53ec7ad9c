use super::*;
use crate::distance::DistanceMetric;
use std::sync::Arc;

fn cfg(metric: DistanceMetric) -> HnswConfig {
    HnswConfig {
        m: 8,
        ef_construction: 64,
        ef_search: 32,
        metric,
        ..Default::default()
    }
}

#[test]
fn s2_end_to_end_cosine_search() {
    let idx = HnswIndex::new(3, cfg(DistanceMetric::Cosine));
    idx.insert("x", &[1.0, 0.0, 0.0]).unwrap();
    idx.insert("y", &[0.0, 1.0, 0.0]).unwrap();
    idx.insert("z", &[0.0, 0.0, 1.0]).unwrap();

    let hits = idx.search(&[0.9, 0.1, 0.0], 1).unwrap();
    assert_eq!(hits[0].id, "x");
    assert!(hits[0].distance <= 0.01);
}

#[test]
fn search_rejects_k_zero_and_bad_dimension() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    idx.insert("a", &[1.0, 2.0]).unwrap();
    assert!(matches!(idx.search(&[1.0, 2.0], 0), Err(Error::Invalid(_))));
    assert!(matches!(idx.search(&[1.0], 1), Err(Error::Invalid(_))));
}

#[test]
fn insert_rejects_non_finite_vector() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    assert!(matches!(idx.insert("a", &[f32::NAN, 0.0]), Err(Error::Invalid(_))));
}

#[test]
fn delete_then_search_never_returns_the_deleted_id() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    for i in 0..60 {
        idx.insert(&format!("n{i}"), &[i as f32, 0.0]).unwrap();
    }
    for i in (0..60).step_by(3) {
        assert!(idx.delete(&format!("n{i}")));
    }
    let stats = idx.stats();
    assert_eq!(stats.live_count, 60 - 20);

    let hits = idx.search(&[0.0, 0.0], 10).unwrap();
    for hit in &hits {
        let n: usize = hit.id[1..].parse().unwrap();
        assert_ne!(n % 3, 0);
    }
}

#[test]
fn update_moves_the_vector() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    idx.insert("a", &[0.0, 0.0]).unwrap();
    idx.update("a", &[100.0, 100.0]).unwrap();
    let hits = idx.search(&[100.0, 100.0], 1).unwrap();
    assert_eq!(hits[0].id, "a");
    assert!(hits[0].distance < 1e-6);
}

#[test]
fn batch_insert_reports_per_item_success() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    let ids = vec!["a".to_string(), "b".to_string()];
    let vectors = vec![vec![1.0, 0.0], vec![f32::NAN, 0.0]];
    let results = idx.batch_insert(&ids, &vectors, &|| false);
    assert_eq!(results, vec![true, false]);
    assert_eq!(idx.stats().live_count, 1);
}

#[test]
fn batch_insert_honors_cancellation() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    let ids: Vec<String> = (0..5).map(|i| format!("n{i}")).collect();
    let vectors: Vec<Vec<f32>> = (0..5).map(|i| vec![i as f32, 0.0]).collect();
    let mut calls = 0;
    let results = idx.batch_insert(&ids, &vectors, &|| {
        calls += 1;
        calls > 2
    });
    assert_eq!(results.iter().filter(|&&b| b).count(), 2);
}

#[test]
fn compact_preserves_live_entries_and_clears_tombstones() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    for i in 0..30 {
        idx.insert(&format!("n{i}"), &[i as f32, 0.0]).unwrap();
    }
    for i in (0..30).step_by(2) {
        idx.delete(&format!("n{i}"));
    }
    assert_eq!(idx.stats().tombstone_count, 15);
    idx.compact().unwrap();
    assert_eq!(idx.stats().live_count, 15);
    assert_eq!(idx.stats().tombstone_count, 0);

    let hits = idx.search(&[1.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].id, "n1");
}

#[test]
fn maybe_compact_only_runs_above_threshold() {
    let idx = HnswIndex::new(2, cfg(DistanceMetric::L2));
    for i in 0..10 {
        idx.insert(&format!("n{i}"), &[i as f32, 0.0]).unwrap();
    }
    idx.delete("n0");
    assert!(!idx.maybe_compact(0.5).unwrap());
    for i in 1..6 {
        idx.delete(&format!("n{i}"));
    }
    assert!(idx.maybe_compact(0.2).unwrap());
    assert_eq!(idx.stats().tombstone_count, 0);
}

#[test]
fn recall_at_10_against_flat_is_reasonably_high() {
    use crate::index::flat::FlatIndex;

    let dim = 16;
    let n = 600;
    let mut seed = 0x1234_5678_9abc_def1u64;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed as f64 / u64::MAX as f64) as f32
    };

    let flat = FlatIndex::new(dim, DistanceMetric::L2);
    let hnsw = HnswIndex::new(
        dim,
        HnswConfig {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
            metric: DistanceMetric::L2,
            ..Default::default()
        },
    );

    for i in 0..n {
        let v: Vec<f32> = (0..dim).map(|_| next()).collect();
        let id = format!("n{i}");
        flat.insert(&id, &v).unwrap();
        hnsw.insert(&id, &v).unwrap();
    }

    let mut hit_total = 0usize;
    let queries = 30;
    for _ in 0..queries {
        let q: Vec<f32> = (0..dim).map(|_| next()).collect();
        let truth: std::collections::HashSet<String> = flat
            .search(&q, 10)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        let got = hnsw.search(&q, 10).unwrap();
        hit_total += got.into_iter().filter(|n| truth.contains(&n.id)).count();
    }
    let recall = hit_total as f64 / (queries * 10) as f64;
    assert!(recall >= 0.7, "recall@10 was {recall}");
}

#[test]
fn concurrent_readers_see_only_fully_inserted_records() {
    let idx = Arc::new(HnswIndex::new(4, cfg(DistanceMetric::L2)));
    let writer_idx = Arc::clone(&idx);
    let writer = std::thread::spawn(move || {
        for i in 0..300 {
            writer_idx
                .insert(&format!("n{i}"), &[i as f32, 0.0, 0.0, 0.0])
                .unwrap();
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let reader_idx = Arc::clone(&idx);
        readers.push(std::thread::spawn(move || {
            for _ in 0..50 {
                let _ = reader_idx.search(&[0.0, 0.0, 0.0, 0.0], 5).unwrap();
            }
        }));
    }

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(idx.stats().live_count, 300);
}
