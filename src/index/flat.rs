//! Linear-scan index: the correctness oracle for HNSW (spec.md §4.3).

use super::{Index, IndexStats, Neighbor};
use crate::distance::{all_finite, distance as metric_distance, DistanceMetric};
use crate::error::{Error, Result};
use crate::quantizer::Quantizer;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// A stored entry is either the full-precision vector, or — once a
/// quantizer is attached and trained — its compact code (spec.md §4.5
/// "the index stores codes instead of raw vectors"). A vector inserted
/// before the attached quantizer has been trained falls back to `Raw`
/// rather than blocking the insert.
enum Stored {
    Raw(Vec<f32>),
    Coded(Vec<u8>),
}

/// Exhaustive nearest-neighbor index: O(N·d) per search, no approximation.
///
/// When constructed via [`Self::with_quantizer`], every insert tries to
/// encode the vector through the shared quantizer first; a trained
/// quantizer's code replaces the raw vector in storage, and search ranks
/// coded entries using the quantizer's own asymmetric `distance` (an
/// approximation of the configured metric, not the metric itself) rather
/// than the exact kernel in [`crate::distance`].
pub struct FlatIndex {
    dimensions: usize,
    metric: DistanceMetric,
    quantizer: Option<Arc<Mutex<Box<dyn Quantizer>>>>,
    vectors: RwLock<FxHashMap<String, Stored>>,
}

impl FlatIndex {
    /// Creates an empty flat index for the given dimension and metric,
    /// with no quantizer: every entry is stored and scored at full
    /// precision.
    #[must_use]
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            quantizer: None,
            vectors: RwLock::new(FxHashMap::default()),
        }
    }

    /// Creates an empty flat index that routes inserted vectors through
    /// `quantizer` (spec.md §4.5). `quantizer` is shared with the
    /// component that trains it (typically the client facade), so a
    /// later `train()` call takes effect for subsequent inserts without
    /// re-registering anything here.
    #[must_use]
    pub fn with_quantizer(dimensions: usize, metric: DistanceMetric, quantizer: Arc<Mutex<Box<dyn Quantizer>>>) -> Self {
        Self {
            dimensions,
            metric,
            quantizer: Some(quantizer),
            vectors: RwLock::new(FxHashMap::default()),
        }
    }

    fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::Invalid(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        if !all_finite(vector) {
            return Err(Error::Invalid("vector contains non-finite values".into()));
        }
        Ok(())
    }

    /// Encodes `vector` through the attached quantizer if one is present
    /// and already trained; falls back to storing it raw otherwise.
    fn encode_for_storage(&self, vector: Vec<f32>) -> Stored {
        if let Some(quantizer) = &self.quantizer {
            if let Ok(code) = quantizer.lock().encode(&vector) {
                return Stored::Coded(code);
            }
        }
        Stored::Raw(vector)
    }

    /// Scores `entry` against `query`, using the exact configured metric
    /// for raw entries and the quantizer's asymmetric distance for coded
    /// ones.
    fn score(&self, query: &[f32], entry: &Stored) -> Result<f32> {
        match entry {
            Stored::Raw(vector) => metric_distance(self.metric, query, vector),
            Stored::Coded(code) => {
                let quantizer = self
                    .quantizer
                    .as_ref()
                    .expect("a Coded entry only exists when a quantizer is attached");
                quantizer.lock().distance(query, code)
            }
        }
    }
}

/// Max-heap entry ordered by distance descending (so the heap's peek is
/// the current worst of the top-k), ties broken so that the
/// lexicographically *larger* id sorts as "worse" and is evicted first.
struct HeapEntry {
    distance: f32,
    id: String,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance && self.id == other.id
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl Index for FlatIndex {
    fn insert(&self, id: &str, vector: &[f32]) -> Result<()> {
        self.validate(vector)?;
        let mut vectors = self.vectors.write();
        if vectors.contains_key(id) {
            return Err(Error::Conflict(format!("id already present: {id}")));
        }
        let stored = self.encode_for_storage(vector.to_vec());
        vectors.insert(id.to_string(), stored);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.validate(query)?;
        if k == 0 {
            return Err(Error::Invalid("k must be > 0".into()));
        }
        let vectors = self.vectors.read();
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        for (id, entry) in vectors.iter() {
            let distance = self.score(query, entry)?;
            if heap.len() < k {
                heap.push(HeapEntry {
                    distance,
                    id: id.clone(),
                });
            } else if let Some(worst) = heap.peek() {
                if distance < worst.distance || (distance == worst.distance && id < &worst.id) {
                    heap.pop();
                    heap.push(HeapEntry {
                        distance,
                        id: id.clone(),
                    });
                }
            }
        }
        let mut results: Vec<Neighbor> = heap
            .into_iter()
            .map(|e| Neighbor {
                id: e.id,
                distance: e.distance,
            })
            .collect();
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(results)
    }

    fn update(&self, id: &str, vector: &[f32]) -> Result<()> {
        self.validate(vector)?;
        let mut vectors = self.vectors.write();
        if !vectors.contains_key(id) {
            return Err(Error::NotFound(id.to_string()));
        }
        let stored = self.encode_for_storage(vector.to_vec());
        vectors.insert(id.to_string(), stored);
        Ok(())
    }

    fn delete(&self, id: &str) -> bool {
        self.vectors.write().remove(id).is_some()
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            live_count: self.vectors.read().len(),
            tombstone_count: 0,
            metric: self.metric,
        }
    }

    fn close(&self) {
        // No external resources held.
    }
}

#[cfg(test)]
#[path = "flat_tests.rs"]
mod tests;
