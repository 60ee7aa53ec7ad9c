//! The vector record: the atom of storage (spec.md §3).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored vector together with its metadata.
///
/// `id` is opaque and globally unique within one database. `vector` must
/// have a length equal to the owning database's declared dimension and
/// contain only finite values. `metadata` is a JSON-compatible key/value
/// map, empty when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Unique identifier, lowercase hex if generated by the index.
    pub id: String,
    /// The embedding.
    pub vector: Vec<f32>,
    /// Arbitrary JSON-compatible metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(id: String, vector: Vec<f32>, metadata: Map<String, Value>) -> Self {
        Self {
            id,
            vector,
            metadata,
        }
    }

    /// Creates a new record with no metadata.
    #[must_use]
    pub fn without_metadata(id: String, vector: Vec<f32>) -> Self {
        Self::new(id, vector, Map::new())
    }

    /// Vector length.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// A single k-NN search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// Id of the matching record.
    pub id: String,
    /// Distance under the index's configured metric (lower is closer).
    pub distance: f32,
    /// Metadata of the matching record.
    pub metadata: Map<String, Value>,
}

impl SearchHit {
    /// Creates a new search hit.
    #[must_use]
    pub fn new(id: String, distance: f32, metadata: Map<String, Value>) -> Self {
        Self {
            id,
            distance,
            metadata,
        }
    }
}

/// Generates a fresh globally-unique id: a 128-bit random value rendered as
/// a lowercase hex string (spec.md §3), via UUID v4's underlying entropy
/// source with the hyphens stripped.
#[must_use]
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
#[path = "point_tests.rs"]
mod tests;
