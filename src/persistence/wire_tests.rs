use super::*;
use crate::index::hnsw::NodeSnapshot;
use serde_json::json;
use tempfile::tempdir;

fn sample_records() -> Vec<VectorRecord> {
    vec![
        VectorRecord::new("a".into(), vec![1.0, 2.0], Map::new()),
        VectorRecord::new(
            "b".into(),
            vec![3.0, 4.0],
            json!({"tag": "x"}).as_object().unwrap().clone(),
        ),
    ]
}

#[test]
fn vectors_roundtrip() {
    let encoded = encode_vectors(&sample_records()).unwrap();
    let decoded = decode_vectors(&encoded).unwrap();
    assert_eq!(decoded, sample_records());
}

#[test]
fn vectors_decode_rejects_bad_magic() {
    assert!(matches!(decode_vectors(b"nope"), Err(Error::Corruption(_))));
}

#[test]
fn vectors_decode_rejects_truncated_payload() {
    let mut encoded = encode_vectors(&sample_records()).unwrap();
    encoded.truncate(encoded.len() - 3);
    assert!(matches!(decode_vectors(&encoded), Err(Error::Corruption(_))));
}

fn sample_graph_snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![
            NodeSnapshot {
                id: "a".into(),
                level: 1,
                neighbors: vec![vec!["b".to_string()], vec!["b".to_string()]],
                tombstoned: false,
            },
            NodeSnapshot {
                id: "b".into(),
                level: 1,
                neighbors: vec![vec!["a".to_string()], vec!["a".to_string()]],
                tombstoned: true,
            },
        ],
        entry_point: Some("a".to_string()),
    }
}

#[test]
fn hnsw_index_roundtrip() {
    let snapshot = sample_graph_snapshot();
    let encoded = encode_hnsw_index(&snapshot).unwrap();
    let decoded = decode_hnsw_index(&encoded).unwrap();
    assert_eq!(decoded.entry_point, Some("a".to_string()));
    assert_eq!(decoded.nodes.len(), 2);
    assert!(!decoded.nodes[0].tombstoned);
    assert!(decoded.nodes[1].tombstoned);
    assert_eq!(decoded.nodes[0].neighbors, vec![vec!["b".to_string()], vec!["b".to_string()]]);
}

#[test]
fn hnsw_index_with_no_entry_point_roundtrips() {
    let snapshot = GraphSnapshot {
        nodes: Vec::new(),
        entry_point: None,
    };
    let encoded = encode_hnsw_index(&snapshot).unwrap();
    let decoded = decode_hnsw_index(&encoded).unwrap();
    assert!(decoded.entry_point.is_none());
    assert!(decoded.nodes.is_empty());
}

#[test]
fn hnsw_index_decode_rejects_bad_magic() {
    assert!(matches!(decode_hnsw_index(b"nope"), Err(Error::Corruption(_))));
}

#[test]
fn checksum_is_stable_and_detects_changes() {
    let a = checksum(b"hello");
    let b = checksum(b"hello");
    let c = checksum(b"hellp");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}

#[test]
fn write_atomic_then_read_checked_roundtrips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vectors.bin");
    let bytes = encode_vectors(&sample_records()).unwrap();
    write_atomic(&path, &bytes).unwrap();

    let sum = checksum(&bytes);
    let read_back = read_checked(&path, &sum).unwrap();
    assert_eq!(read_back, bytes);
}

#[test]
fn read_checked_rejects_mismatched_checksum() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vectors.bin");
    let bytes = encode_vectors(&sample_records()).unwrap();
    write_atomic(&path, &bytes).unwrap();

    assert!(matches!(read_checked(&path, "0".repeat(64).as_str()), Err(Error::Corruption(_))));
}

#[test]
fn write_atomic_leaves_previous_file_intact_if_interrupted_before_rename() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vectors.bin");
    write_atomic(&path, b"first").unwrap();
    // The temp path used internally never collides with `path` itself, so a
    // reader observing the directory mid-write still sees the prior file.
    assert_eq!(std::fs::read(&path).unwrap(), b"first");
    write_atomic(&path, b"second").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"second");
}
