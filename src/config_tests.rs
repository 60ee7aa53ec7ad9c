use super::*;
use std::io::Write;

#[test]
fn defaults_validate_after_setting_dimensions() {
    let mut cfg = DatabaseConfig::default();
    cfg.dimensions = 128;
    assert!(cfg.validate().is_ok());
}

#[test]
fn zero_dimensions_is_invalid() {
    let cfg = DatabaseConfig::default();
    assert!(matches!(cfg.validate(), Err(Error::Invalid(_))));
}

#[test]
fn zero_m_is_invalid() {
    let mut cfg = DatabaseConfig {
        dimensions: 8,
        ..Default::default()
    };
    cfg.hnsw.m = 0;
    assert!(matches!(cfg.validate(), Err(Error::Invalid(_))));
}

#[test]
fn effective_m_max0_defaults_to_double_m() {
    let cfg = HnswConfig {
        m: 16,
        ..Default::default()
    };
    assert_eq!(cfg.effective_m_max0(), 32);
}

#[test]
fn effective_m_max0_honors_override() {
    let cfg = HnswConfig {
        m: 16,
        m_max0: Some(40),
        ..Default::default()
    };
    assert_eq!(cfg.effective_m_max0(), 40);
}

#[test]
fn effective_ef_search_is_at_least_k() {
    let cfg = HnswConfig {
        ef_search: 10,
        ..Default::default()
    };
    assert_eq!(cfg.effective_ef_search(3), 10);
    assert_eq!(cfg.effective_ef_search(50), 50);
}

#[test]
fn load_merges_toml_file_over_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "dimensions = 64\n[hnsw]\nm = 24").unwrap();
    let cfg = DatabaseConfig::load(file.path()).unwrap();
    assert_eq!(cfg.dimensions, 64);
    assert_eq!(cfg.hnsw.m, 24);
    // unset fields keep their defaults
    assert_eq!(cfg.hnsw.ef_construction, 200);
}

#[test]
fn load_rejects_unknown_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "dimensions = 64\nbogus_top_level_key = 1").unwrap();
    let result = DatabaseConfig::load(file.path());
    assert!(result.is_err());
}

#[test]
fn load_env_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "dimensions = 64").unwrap();
    std::env::set_var("VDB_DIMENSIONS", "96");
    let cfg = DatabaseConfig::load(file.path()).unwrap();
    std::env::remove_var("VDB_DIMENSIONS");
    assert_eq!(cfg.dimensions, 96);
}
