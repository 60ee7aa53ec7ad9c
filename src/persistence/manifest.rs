//! The manifest file: UTF-8 JSON naming a snapshot's schema version,
//! timestamp, database descriptor, sibling file names and checksums
//! (spec.md §6 "Snapshot on-disk format").

use crate::config::{HnswConfig, IndexType, QuantizerConfig};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current manifest schema version.
pub(crate) const MANIFEST_VERSION: u32 = 1;

/// Snapshot manifest, serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub(crate) version: u32,
    pub(crate) created_at: i64,
    pub(crate) dimensions: usize,
    pub(crate) metric: DistanceMetric,
    pub(crate) index_type: IndexType,
    pub(crate) params: ManifestParams,
    pub(crate) vectors_file: String,
    pub(crate) index_file: String,
    pub(crate) vectors_sha256: String,
    pub(crate) index_sha256: String,
}

/// Index-specific parameters carried for informational/recovery purposes.
/// HNSW parameters are recorded even when `index_type == Flat` is not the
/// case; flat snapshots carry the zeroed default.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub(crate) struct ManifestParams {
    pub(crate) hnsw: Option<HnswConfig>,
    pub(crate) quantizer: Option<QuantizerConfig>,
}

impl Manifest {
    pub(crate) fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Internal(format!("manifest serialization failed: {e}")))?;
        crate::persistence::wire::write_atomic(path, &json)
    }

    pub(crate) fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let manifest: Self = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Corruption(format!("manifest decode failed: {e}")))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        Ok(manifest)
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
