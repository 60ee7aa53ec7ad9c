//! Pluggable similarity index: [`flat`] (linear-scan oracle) and [`hnsw`]
//! (approximate multi-layer graph), per spec.md §4.3/§4.4.

pub mod flat;
pub mod hnsw;

use crate::distance::DistanceMetric;
use crate::error::Result;

/// A single index-level nearest-neighbor result: an id and a distance
/// under the index's configured metric. Indexes do not carry metadata —
/// that lives in the storage backend; the client facade joins the two
/// into a [`crate::point::SearchHit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Id of the matching entry.
    pub id: String,
    /// Distance under the index's configured metric (lower is closer).
    pub distance: f32,
}

/// Aggregate index statistics, returned by [`Index::stats`].
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    /// Number of live (non-tombstoned) entries.
    pub live_count: usize,
    /// Number of tombstoned entries still occupying graph slots. Always 0
    /// for the flat index.
    pub tombstone_count: usize,
    /// Configured distance metric.
    pub metric: DistanceMetric,
}

/// Capability set implemented by every index variant (spec.md §9
/// "Polymorphism over storage and index").
///
/// Implementations own no storage of their own record payload beyond what
/// the algorithm needs (vectors for flat, vectors + graph structure for
/// HNSW); the client facade is responsible for the canonical copy in the
/// storage backend.
pub trait Index: Send + Sync {
    /// Inserts a new vector under `id`. `id` must not already exist in the
    /// index.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` on a dimension mismatch or non-finite
    /// vector, `Error::Conflict` if `id` is already present.
    fn insert(&self, id: &str, vector: &[f32]) -> Result<()>;

    /// Returns the `k` nearest live entries to `query`, ascending by
    /// distance, ties broken by id lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if `query`'s dimension does not match the
    /// index's, or if `k == 0`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Replaces the vector stored under `id`. Semantically a tombstone of
    /// the old entry followed by a fresh insert under the same id
    /// (spec.md §4.4 "Update").
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `id` is not present, `Error::Invalid`
    /// on a dimension mismatch.
    fn update(&self, id: &str, vector: &[f32]) -> Result<()>;

    /// Logically deletes `id`. Returns `true` iff a live entry existed.
    fn delete(&self, id: &str) -> bool;

    /// Bulk insert. A caller-supplied cancellation flag, checked between
    /// items, allows early return with partial application; callers see
    /// a `false` at every index not yet attempted.
    fn batch_insert(&self, ids: &[String], vectors: &[Vec<f32>], cancelled: &dyn Fn() -> bool) -> Vec<bool> {
        ids.iter()
            .zip(vectors.iter())
            .map(|(id, v)| {
                if cancelled() {
                    return false;
                }
                self.insert(id, v).is_ok()
            })
            .collect()
    }

    /// Bulk delete, amortizing lock acquisition where the implementation
    /// can (spec.md §4.4 "batch_update applies these under a single write
    /// lock").
    fn batch_delete(&self, ids: &[String]) -> Vec<bool> {
        ids.iter().map(|id| self.delete(id)).collect()
    }

    /// Aggregate stats for this index.
    fn stats(&self) -> IndexStats;

    /// Releases index resources. Idempotent.
    fn close(&self);

    /// Downcasts to [`hnsw::HnswIndex`] for operations (compaction,
    /// snapshot export) that are specific to the graph-based variant and
    /// have no flat-index equivalent. `None` for every other
    /// implementation. A narrow, deliberate alternative to a generic
    /// `as_any` since only one such operation family exists in this
    /// crate.
    fn as_hnsw(&self) -> Option<&hnsw::HnswIndex> {
        None
    }
}
