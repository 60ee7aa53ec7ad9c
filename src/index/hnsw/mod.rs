//! Multi-layer proximity graph k-NN index (spec.md §4.4): the approximate,
//! incrementally-updatable alternative to [`super::flat::FlatIndex`].
//!
//! - [`graph`] owns the algorithm: insertion, beam search, heuristic
//!   neighbor selection, tombstoning and entry-point promotion.
//! - [`mappings`] translates between caller ids and dense internal node
//!   ids.
//! - [`layer`] is one level's adjacency lists.
//! - [`ordered_float`] gives `f32` a total order so distances can live in a
//!   `BinaryHeap`.
//!
//! [`HnswIndex`] is the single piece of substantial shared mutable state
//! in this crate (spec.md §9): one [`parking_lot::RwLock`] around the
//! whole graph, any number of concurrent readers or one writer at a time.

pub(crate) mod graph;
pub(crate) mod layer;
pub(crate) mod mappings;
pub(crate) mod ordered_float;

use super::{Index, IndexStats, Neighbor};
use crate::config::HnswConfig;
use crate::distance::all_finite;
use crate::error::{Error, Result};
pub(crate) use graph::{GraphSnapshot, NodeSnapshot};
use graph::HnswGraph;
use parking_lot::RwLock;

/// Multi-layer proximity graph index. See module docs.
pub struct HnswIndex {
    dimensions: usize,
    config: HnswConfig,
    graph: RwLock<HnswGraph>,
}

impl HnswIndex {
    /// Creates an empty HNSW index for the given dimension and
    /// configuration.
    #[must_use]
    pub fn new(dimensions: usize, config: HnswConfig) -> Self {
        let graph = HnswGraph::new(dimensions, &config);
        Self {
            dimensions,
            config,
            graph: RwLock::new(graph),
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

    /// Fraction of graph slots currently tombstoned.
    #[must_use]
    pub fn tombstone_ratio(&self) -> f64 {
        let graph = self.graph.read();
        let total = graph.live_count() + graph.tombstone_count();
        if total == 0 {
            0.0
        } else {
            graph.tombstone_count() as f64 / total as f64
        }
    }

    /// Rebuilds the graph from scratch, reinserting every live node and
    /// dropping tombstones — the only way to reclaim neighbor-slot space
    /// (spec.md §4.4 "Deletion"). Existing node ids (internal, not caller
    /// ids) are not preserved; caller-facing ids and their vectors are.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if a live entry somehow fails
    /// re-insertion (would indicate a bug, since every entry was already
    /// validated once).
    pub fn compact(&self) -> Result<()> {
        let live = self.graph.read().live_entries();
        let mut fresh = HnswGraph::new(self.dimensions, &self.config);
        for (id, vector) in live {
            fresh
                .insert(&id, vector)
                .map_err(|e| Error::Internal(format!("compaction re-insert failed: {e}")))?;
        }
        *self.graph.write() = fresh;
        Ok(())
    }

    /// Runs [`Self::compact`] if the tombstone ratio exceeds
    /// `threshold`. Returns whether compaction ran.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::compact`]'s errors.
    pub fn maybe_compact(&self, threshold: f64) -> Result<bool> {
        if self.tombstone_ratio() > threshold {
            self.compact()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Exports the full graph structure for persistence (spec.md §4.6).
    pub(crate) fn export_snapshot(&self) -> GraphSnapshot {
        self.graph.read().export()
    }

    /// Rebuilds an index from a previously-exported snapshot. `vector_for_id`
    /// supplies each node's vector (looked up from the rehydrated storage
    /// backend); a tombstoned node whose record no longer exists there gets
    /// an all-zero placeholder (see [`HnswGraph::restore`]).
    #[must_use]
    pub(crate) fn restore_from(
        dimensions: usize,
        config: HnswConfig,
        snapshot: &GraphSnapshot,
        vector_for_id: impl FnMut(&str) -> Option<Vec<f32>>,
    ) -> Self {
        let graph = HnswGraph::restore(dimensions, &config, snapshot, vector_for_id);
        Self {
            dimensions,
            config,
            graph: RwLock::new(graph),
        }
    }

    /// Applies a batch of vector updates under a single write-lock
    /// acquisition, amortizing locking cost (spec.md §4.4 "batch_update").
    /// A caller-supplied cancellation check is polled between items.
    pub fn batch_update(&self, ids: &[String], vectors: &[Vec<f32>], cancelled: &dyn Fn() -> bool) -> Vec<bool> {
        let mut graph = self.graph.write();
        ids.iter()
            .zip(vectors.iter())
            .map(|(id, vector)| {
                if cancelled() {
                    return false;
                }
                if self.validate(vector).is_err() {
                    return false;
                }
                graph.update(id, vector.clone()).is_ok()
            })
            .collect()
    }
}

impl Index for HnswIndex {
    fn insert(&self, id: &str, vector: &[f32]) -> Result<()> {
        self.validate(vector)?;
        self.graph.write().insert(id, vector.to_vec())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.validate(query)?;
        if k == 0 {
            return Err(Error::Invalid("k must be > 0".into()));
        }
        let ef = self.config.effective_ef_search(k);
        let hits = self.graph.read().search(query, k, ef);
        Ok(hits
            .into_iter()
            .map(|(id, distance)| Neighbor { id, distance })
            .collect())
    }

    fn update(&self, id: &str, vector: &[f32]) -> Result<()> {
        self.validate(vector)?;
        self.graph.write().update(id, vector.to_vec())
    }

    fn delete(&self, id: &str) -> bool {
        self.graph.write().delete(id)
    }

    fn batch_insert(&self, ids: &[String], vectors: &[Vec<f32>], cancelled: &dyn Fn() -> bool) -> Vec<bool> {
        let mut graph = self.graph.write();
        ids.iter()
            .zip(vectors.iter())
            .map(|(id, vector)| {
                if cancelled() {
                    return false;
                }
                if self.validate(vector).is_err() {
                    return false;
                }
                graph.insert(id, vector.clone()).is_ok()
            })
            .collect()
    }

    fn batch_delete(&self, ids: &[String]) -> Vec<bool> {
        let mut graph = self.graph.write();
        ids.iter().map(|id| graph.delete(id)).collect()
    }

    fn stats(&self) -> IndexStats {
        let graph = self.graph.read();
        IndexStats {
            live_count: graph.live_count(),
            tombstone_count: graph.tombstone_count(),
            metric: graph.metric(),
        }
    }

    fn close(&self) {
        // No external resources held; the graph drops with the index.
    }

    fn as_hnsw(&self) -> Option<&HnswIndex> {
        Some(self)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
