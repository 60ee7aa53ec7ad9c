//! Typed configuration records.
//!
//! Per Design Note "Dynamic configuration maps" (spec.md §9), configuration
//! is a typed record per component rather than an untyped key/value bag.
//! Values can come from defaults, a `vekto.toml` file, and `VDB_*`
//! environment variables, merged via `figment` with the following priority
//! (highest to lowest): runtime overrides > environment variables >
//! config file > defaults. Unknown keys fail to deserialize, which this
//! module surfaces as `Error::Invalid`.

use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fsync policy for the file-backed storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsyncPolicy {
    /// Never fsync explicitly; rely on OS page cache flush timing.
    Never,
    /// Fsync after every write. Safest, slowest.
    #[default]
    PerWrite,
    /// Fsync on a background interval, in milliseconds.
    PeriodicMs(u64),
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// In-memory hash map; nothing survives process exit without a
    /// persistence manager snapshot.
    #[default]
    Memory,
    /// Append-only log file with an in-memory offset index.
    File,
}

/// Storage backend configuration (spec.md §9 "Dynamic configuration maps").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend variant to construct.
    pub kind: StorageKind,
    /// Directory for the file-backed variant. Ignored for `Memory`.
    pub path: Option<String>,
    /// Fsync policy for the file-backed variant. Ignored for `Memory`.
    pub fsync_policy: FsyncPolicy,
    /// Tombstone ratio above which compaction is auto-triggered.
    pub compaction_threshold: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::default(),
            path: None,
            fsync_policy: FsyncPolicy::default(),
            compaction_threshold: 0.2,
        }
    }
}

/// HNSW index configuration (spec.md §4.4, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HnswConfig {
    /// Target out-degree on upper layers.
    pub m: usize,
    /// Bound on level-0 out-degree. `None` defaults to `2 * m`.
    pub m_max0: Option<usize>,
    /// Candidate list size during inserts.
    pub ef_construction: usize,
    /// Candidate list size during queries.
    pub ef_search: usize,
    /// Distance metric, fixed at index creation.
    pub metric: DistanceMetric,
    /// PRNG seed for level assignment.
    pub seed: u64,
    /// Whether `insert` may reuse an id slot occupied by a tombstoned node
    /// instead of always allocating a fresh internal node.
    pub allow_replace_deleted: bool,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: None,
            ef_construction: 200,
            ef_search: 50,
            metric: DistanceMetric::Cosine,
            seed: 0x5DEE_CE66_D1A4_B5B5,
            allow_replace_deleted: false,
        }
    }
}

impl HnswConfig {
    /// Resolved bound on level-0 out-degree: `m_max0` if set, else `2 * m`.
    #[must_use]
    pub fn effective_m_max0(&self) -> usize {
        self.m_max0.unwrap_or(self.m * 2)
    }

    /// Resolved `ef_search` for a query requesting `k` results: at least
    /// `max(ef_search, k)` per spec.md §4.4.
    #[must_use]
    pub fn effective_ef_search(&self, k: usize) -> usize {
        self.ef_search.max(k)
    }

    fn validate(&self) -> Result<()> {
        if self.m == 0 {
            return Err(Error::Invalid("hnsw.m must be > 0".into()));
        }
        if self.ef_construction == 0 {
            return Err(Error::Invalid("hnsw.ef_construction must be > 0".into()));
        }
        Ok(())
    }
}

/// Quantizer configuration (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuantizerConfig {
    /// Whether a quantizer is attached at all.
    pub enabled: bool,
    /// Which quantization scheme to use.
    pub kind: QuantizerKind,
    /// Number of subvectors for product quantization. Ignored for scalar.
    pub pq_subvectors: usize,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: QuantizerKind::Scalar,
            pq_subvectors: 8,
        }
    }
}

/// Quantization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizerKind {
    /// Per-dimension min/max, 8-bit scalar codes.
    #[default]
    Scalar,
    /// Product quantization: `m` subvectors, 256 centroids each.
    Product,
}

/// Persistence manager configuration (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Whether a persistence manager is attached at all.
    pub enabled: bool,
    /// Directory snapshots are written to.
    pub snapshot_dir: String,
    /// Interval between automatic snapshots, in milliseconds. `None`
    /// disables the scheduler; callers must call `flush()` explicitly.
    pub snapshot_interval_ms: Option<u64>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            snapshot_dir: "./snapshots".to_string(),
            snapshot_interval_ms: None,
        }
    }
}

/// Top-level database configuration: dimension, index selection and the
/// per-component configs above.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Declared vector dimension; immutable after creation.
    pub dimensions: usize,
    /// Which index implementation to use.
    pub index_type: IndexType,
    /// Storage backend configuration.
    pub storage: StorageConfig,
    /// HNSW parameters (ignored when `index_type == Flat`).
    pub hnsw: HnswConfig,
    /// Quantizer configuration.
    pub quantizer: QuantizerConfig,
    /// Persistence manager configuration.
    pub persistence: PersistenceConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dimensions: 0,
            index_type: IndexType::default(),
            storage: StorageConfig::default(),
            hnsw: HnswConfig::default(),
            quantizer: QuantizerConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Index implementation selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    /// Linear-scan reference index.
    Flat,
    /// Multi-layer proximity graph, approximate.
    #[default]
    Hnsw,
}

impl DatabaseConfig {
    /// Loads configuration by merging, in increasing priority: built-in
    /// defaults, an optional TOML file at `path`, and `VDB_*` environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if the merged configuration fails to
    /// deserialize (e.g. an unknown key or a value of the wrong type) or
    /// fails semantic validation (e.g. `hnsw.m == 0`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("VDB_").split("__"));
        let config: Self = figment
            .extract()
            .map_err(|e| Error::Invalid(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates dimension and per-component invariants.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if `dimensions == 0` or a sub-config fails
    /// its own validation.
    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            return Err(Error::Invalid("dimensions must be > 0".into()));
        }
        self.hnsw.validate()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
