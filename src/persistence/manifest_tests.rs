use super::*;
use crate::config::IndexType;
use tempfile::tempdir;

fn sample() -> Manifest {
    Manifest {
        version: MANIFEST_VERSION,
        created_at: 1_700_000_000_000,
        dimensions: 3,
        metric: DistanceMetric::Cosine,
        index_type: IndexType::Hnsw,
        params: ManifestParams::default(),
        vectors_file: "vectors.bin".to_string(),
        index_file: "index.bin".to_string(),
        vectors_sha256: "a".repeat(64),
        index_sha256: "b".repeat(64),
    }
}

#[test]
fn write_then_read_roundtrips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    let manifest = sample();
    manifest.write(&path).unwrap();

    let loaded = Manifest::read(&path).unwrap();
    assert_eq!(loaded.dimensions, 3);
    assert_eq!(loaded.vectors_file, "vectors.bin");
}

#[test]
fn read_rejects_wrong_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    let mut manifest = sample();
    manifest.version = 99;
    std::fs::write(&path, serde_json::to_vec(&manifest).unwrap()).unwrap();
    assert!(matches!(Manifest::read(&path), Err(Error::Corruption(_))));
}

#[test]
fn read_rejects_malformed_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("manifest.json");
    std::fs::write(&path, b"not json").unwrap();
    assert!(matches!(Manifest::read(&path), Err(Error::Corruption(_))));
}
