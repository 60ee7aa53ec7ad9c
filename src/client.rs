//! The client facade (spec.md §4.7, §6): composes storage, index,
//! quantizer and persistence, enforces lifecycle, and exposes the uniform
//! operations external callers (HTTP surface, CLI, embedding adapters —
//! all out of scope here) actually invoke.
//!
//! Modeled on the teacher crate's [`Database`]/[`Collection`] split
//! (`lib.rs`, `collection/core.rs`): `Database` owns a directory and
//! hands out named collections; here a single [`VectorDatabase`] *is* one
//! collection's worth of state, since spec.md has no notion of multiple
//! named collections in one process.
//!
//! The quantizer is attached as an auxiliary capability (train/encode/
//! decode/stats) shared by `Arc` with whichever index wants it, rather
//! than baked in by inheritance (spec.md §9 "independently-optional...
//! attached via composition"). [`crate::index::flat::FlatIndex`] is wired
//! to it end to end: once `train_quantizer` trains the shared instance,
//! `FlatIndex::with_quantizer` starts storing the encoded code instead of
//! the raw `f32` vector for every subsequent insert, and scores it with
//! the quantizer's own asymmetric distance (spec.md §4.5 "the index
//! stores codes instead of raw vectors"). [`crate::index::hnsw::HnswGraph`]
//! deliberately keeps full-precision vectors regardless: its greedy
//! descent and beam search lean on exact local comparisons to build
//! correct graph structure, and quantization error there would degrade
//! recall during construction, not just at query time.

use crate::config::{DatabaseConfig, IndexType, StorageKind};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::flat::FlatIndex;
use crate::index::hnsw::HnswIndex;
use crate::index::{Index, IndexStats};
use crate::persistence::{PersistenceManager, RestoredSnapshot, SnapshotInput};
use crate::point::{generate_id, SearchHit, VectorRecord};
use crate::quantizer::{Quantizer, QuantizerStats, ScalarQuantizer};
#[cfg(feature = "file-storage")]
use crate::storage::file::FileStorage;
use crate::storage::memory::MemoryStorage;
use crate::storage::{Cursor, RecordStream, StorageBackend, StorageStats};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Aggregate statistics across every attached collaborator (spec.md §6
/// `stats()`).
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Storage backend stats.
    pub storage: StorageStats,
    /// Index stats.
    pub index: IndexStats,
    /// Quantizer stats, present iff a quantizer is attached.
    pub quantizer: Option<QuantizerStats>,
    /// Whether a persistence manager is attached.
    pub persistence_enabled: bool,
}

/// Per-item outcome of a batch operation, paired with whether the caller's
/// cancellation signal fired before every item was attempted (spec.md §5
/// "Suspension and cancellation": "return partial results with a
/// `Cancelled` marker").
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// One entry per input item; items at and after the cancellation
    /// point carry their type's "not attempted" value (`false`, or the
    /// relevant sentinel).
    pub results: Vec<T>,
    /// Whether the cancellation signal fired before the batch completed.
    pub cancelled: bool,
}

struct State {
    storage: Box<dyn StorageBackend>,
    index: Box<dyn Index>,
    quantizer: Option<Arc<Mutex<Box<dyn Quantizer>>>>,
    persistence: Option<Arc<PersistenceManager>>,
}

impl State {
    fn close(&self) {
        if let Some(persistence) = &self.persistence {
            persistence.close();
        }
        self.index.close();
        self.storage.close();
    }
}

/// The embeddable vector database: composes a storage backend, an index,
/// an optional quantizer and an optional persistence manager behind a
/// uniform operation set (spec.md §4.7).
///
/// Every operation but [`Self::init`], [`Self::is_initialized`] and
/// [`Self::close`] fails with `Error::NotInitialized` before `init()` or
/// after `close()`.
pub struct VectorDatabase {
    config: DatabaseConfig,
    state: RwLock<Option<State>>,
}

impl VectorDatabase {
    /// Creates a facade for `config`, uninitialized. Call [`Self::init`]
    /// before any other operation.
    #[must_use]
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            state: RwLock::new(None),
        }
    }

    /// Idempotent: a second call while already initialized is a no-op.
    /// Builds every collaborator into a standalone value before
    /// publishing it, so a failure partway through never leaves a
    /// half-initialized database observable to other operations; any
    /// collaborator that *did* finish constructing before the failure is
    /// closed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if `config` fails validation. Returns
    /// `Error::Internal` if a collaborator fails to construct (spec.md
    /// §4.7 names this case `Initialization`; this crate's error kinds,
    /// per spec.md §7, have no separate variant for it, so it surfaces as
    /// `Internal` with a descriptive message).
    pub fn init(&self) -> Result<()> {
        if self.state.read().is_some() {
            return Ok(());
        }
        let mut guard = self.state.write();
        if guard.is_some() {
            return Ok(());
        }
        self.config.validate()?;
        let state = self.build_state()?;
        *guard = Some(state);
        Ok(())
    }

    fn build_state(&self) -> Result<State> {
        let storage = self.build_storage()?;

        let restored = if self.config.persistence.enabled {
            self.try_restore(storage.as_ref())
        } else {
            None
        };

        // Built before the index so a flat index can share the same
        // quantizer instance for its storage path (spec.md §4.5): once
        // `train_quantizer` trains it, subsequent inserts through the
        // index start storing codes instead of raw vectors.
        let quantizer = if self.config.quantizer.enabled {
            Some(Arc::new(Mutex::new(self.build_quantizer())))
        } else {
            None
        };

        let index = match self.build_index(restored.as_ref(), quantizer.clone()) {
            Ok(index) => index,
            Err(e) => {
                storage.close();
                return Err(e);
            }
        };

        if let Some(restored) = &restored {
            if let Err(e) = self.rehydrate_storage(storage.as_ref(), restored) {
                index.close();
                storage.close();
                return Err(e);
            }
        }

        let persistence = if self.config.persistence.enabled {
            match PersistenceManager::new(self.config.persistence.clone()) {
                Ok(manager) => Some(Arc::new(manager)),
                Err(e) => {
                    index.close();
                    storage.close();
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(State {
            storage,
            index,
            quantizer,
            persistence,
        })
    }

    fn build_storage(&self) -> Result<Box<dyn StorageBackend>> {
        match self.config.storage.kind {
            StorageKind::Memory => Ok(Box::new(MemoryStorage::new(self.config.dimensions))),
            StorageKind::File => {
                #[cfg(feature = "file-storage")]
                {
                    let path = self
                        .config
                        .storage
                        .path
                        .as_deref()
                        .ok_or_else(|| Error::Invalid("storage.path is required for kind = file".into()))?;
                    let backend =
                        FileStorage::open(path, self.config.dimensions, self.config.storage.fsync_policy)?;
                    Ok(Box::new(backend))
                }
                #[cfg(not(feature = "file-storage"))]
                {
                    Err(Error::Invalid("storage.kind = file requires the file-storage feature".into()))
                }
            }
        }
    }

    fn try_restore(&self, storage: &dyn StorageBackend) -> Option<RestoredSnapshot> {
        let manager = PersistenceManager::new(self.config.persistence.clone()).ok()?;
        match manager.open() {
            Ok(restored) => Some(restored),
            Err(e) => {
                tracing::warn!(error = %e, "no snapshot restored on open");
                let _ = storage;
                None
            }
        }
    }

    fn rehydrate_storage(&self, storage: &dyn StorageBackend, restored: &RestoredSnapshot) -> Result<()> {
        for record in &restored.records {
            storage.put(&record.id, record.vector.clone(), record.metadata.clone())?;
        }
        Ok(())
    }

    fn build_index(
        &self,
        restored: Option<&RestoredSnapshot>,
        quantizer: Option<Arc<Mutex<Box<dyn Quantizer>>>>,
    ) -> Result<Box<dyn Index>> {
        match self.config.index_type {
            IndexType::Flat => {
                let index = match quantizer {
                    Some(quantizer) => {
                        FlatIndex::with_quantizer(self.config.dimensions, self.config.hnsw.metric, quantizer)
                    }
                    None => FlatIndex::new(self.config.dimensions, self.config.hnsw.metric),
                };
                if let Some(restored) = restored {
                    for record in &restored.records {
                        index.insert(&record.id, &record.vector)?;
                    }
                }
                Ok(Box::new(index))
            }
            IndexType::Hnsw => {
                let index = match (restored, restored.and_then(|r| r.graph.as_ref())) {
                    (Some(restored), Some(graph)) => {
                        let by_id: std::collections::HashMap<&str, &[f32]> = restored
                            .records
                            .iter()
                            .map(|r| (r.id.as_str(), r.vector.as_slice()))
                            .collect();
                        HnswIndex::restore_from(self.config.dimensions, self.config.hnsw.clone(), graph, |id| {
                            by_id.get(id).map(|v| v.to_vec())
                        })
                    }
                    _ => HnswIndex::new(self.config.dimensions, self.config.hnsw.clone()),
                };
                Ok(Box::new(index))
            }
        }
    }

    fn build_quantizer(&self) -> Box<dyn Quantizer> {
        match self.config.quantizer.kind {
            crate::config::QuantizerKind::Scalar => Box::new(ScalarQuantizer::new()),
            crate::config::QuantizerKind::Product => {
                Box::new(crate::quantizer::ProductQuantizer::new(self.config.quantizer.pq_subvectors))
            }
        }
    }

    /// Whether [`Self::init`] has run and [`Self::close`] has not.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Releases every collaborator in reverse dependency order
    /// (persistence → quantizer → index → storage; the quantizer itself
    /// holds no external resources so its "release" is simply dropping
    /// it). Idempotent; a second call is a no-op. Individual collaborator
    /// close failures cannot be observed here since `close()` on the
    /// underlying traits does not return `Result` — this mirrors spec.md
    /// §4.7's "exceptions from individual closes are logged but do not
    /// abort the sequence" by construction rather than by catching.
    pub fn close(&self) {
        let state = self.state.write().take();
        if let Some(state) = state {
            state.close();
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&State) -> Result<T>) -> Result<T> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;
        f(state)
    }

    /// Inserts `vectors`, generating an id per record that has no entry in
    /// `metadata`'s corresponding position (or for every record, if
    /// `metadata` is `None`). Returns the ids in input order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` on a dimension mismatch or non-finite
    /// vector. `Error::NotInitialized` before `init()`.
    pub fn insert(&self, vectors: &[Vec<f32>], metadata: Option<&[Map<String, Value>]>) -> Result<Vec<String>> {
        self.with_state(|state| {
            let mut ids = Vec::with_capacity(vectors.len());
            for (i, vector) in vectors.iter().enumerate() {
                let id = generate_id();
                let meta = metadata.and_then(|m| m.get(i)).cloned().unwrap_or_default();
                state.storage.put(&id, vector.clone(), meta)?;
                if let Err(e) = state.index.insert(&id, vector) {
                    state.storage.delete(&id);
                    return Err(e);
                }
                ids.push(id);
            }
            Ok(ids)
        })
    }

    /// Inserts a single record under a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` on a dimension mismatch or non-finite
    /// vector, `Error::Conflict` if `id` already exists in the index.
    pub fn insert_with_id(&self, id: &str, vector: Vec<f32>, metadata: Map<String, Value>) -> Result<()> {
        self.with_state(|state| {
            state.storage.put(id, vector.clone(), metadata)?;
            if let Err(e) = state.index.insert(id, &vector) {
                state.storage.delete(id);
                return Err(e);
            }
            Ok(())
        })
    }

    /// Returns the `k` nearest records to `query`, joined with metadata
    /// from storage (spec.md §6 `search`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` on a dimension mismatch, empty query or
    /// `k == 0`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.with_state(|state| self.search_in(state, query, k))
    }

    fn search_in(&self, state: &State, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let neighbors = state.index.search(query, k)?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for n in neighbors {
            let metadata = state.storage.get(&n.id).map(|r| r.metadata).unwrap_or_default();
            hits.push(SearchHit::new(n.id, n.distance, metadata));
        }
        Ok(hits)
    }

    /// Runs [`Self::search`] for every query in `queries` independently;
    /// a single query's failure does not abort the others — it is not
    /// currently surfaced per-query, so callers that need partial results
    /// on a mixed-validity batch should call [`Self::search`] directly per
    /// item.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, if any.
    #[cfg(not(feature = "parallel"))]
    pub fn batch_search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<SearchHit>>> {
        self.with_state(|state| queries.iter().map(|q| self.search_in(state, q, k)).collect())
    }

    /// Parallel variant of [`Self::batch_search`], data-parallel over
    /// `queries` via `rayon` (spec.md §9 "caller-driven data-parallel
    /// batch_search").
    ///
    /// # Errors
    ///
    /// Returns the first error encountered, if any.
    #[cfg(feature = "parallel")]
    pub fn batch_search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<SearchHit>>> {
        use rayon::prelude::*;
        self.with_state(|state| {
            queries
                .par_iter()
                .map(|q| self.search_in(state, q, k))
                .collect()
        })
    }

    /// Updates `id`'s vector and/or metadata. A vector change is a logical
    /// delete followed by a fresh insert under the same id (spec.md
    /// §4.4). `vector = None, metadata = None` is a no-op that returns
    /// `true` iff `id` exists (spec.md §9 Open Questions).
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` on a dimension mismatch or non-finite
    /// vector.
    pub fn update(&self, id: &str, vector: Option<Vec<f32>>, metadata: Option<Map<String, Value>>) -> Result<bool> {
        self.with_state(|state| {
            if !state.storage.contains(id) {
                return Ok(false);
            }
            match (vector, metadata) {
                (None, None) => Ok(true),
                (Some(vector), metadata) => {
                    let meta = metadata.unwrap_or_else(|| state.storage.get(id).map(|r| r.metadata).unwrap_or_default());
                    state.storage.put(id, vector.clone(), meta)?;
                    state.index.update(id, &vector)?;
                    Ok(true)
                }
                (None, Some(metadata)) => {
                    let existing = state.storage.get(id)?;
                    state.storage.put(id, existing.vector, metadata)?;
                    Ok(true)
                }
            }
        })
    }

    /// Applies `updates` under a single index write-lock acquisition
    /// (spec.md §4.4 "batch_update applies these under a single write
    /// lock"; spec.md §6 `batch_update(ids, vectors, metadata) → [bool]`),
    /// polling `cancelled` between items if supplied. `metadata[i]`
    /// replaces `ids[i]`'s metadata when present; when `metadata` is
    /// `None` (or shorter than `ids`), an item's existing metadata is
    /// preserved, mirroring [`Self::update`]'s own fallback.
    pub fn batch_update(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        metadata: Option<&[Map<String, Value>]>,
        cancelled: Option<&dyn Fn() -> bool>,
    ) -> Result<BatchOutcome<bool>> {
        self.with_state(|state| {
            let is_cancelled = cancelled.unwrap_or(&|| false);
            let mut storage_ok = vec![false; ids.len()];
            let mut stopped = false;
            let mut eligible = Vec::new();
            for (i, (id, vector)) in ids.iter().zip(vectors.iter()).enumerate() {
                if stopped || is_cancelled() {
                    stopped = true;
                    continue;
                }
                if !state.storage.contains(id) {
                    continue;
                }
                let meta = metadata
                    .and_then(|m| m.get(i))
                    .cloned()
                    .unwrap_or_else(|| state.storage.get(id).map(|r| r.metadata).unwrap_or_default());
                if state.storage.put(id, vector.clone(), meta).is_ok() {
                    storage_ok[i] = true;
                    eligible.push(i);
                }
            }

            // Hand only the still-eligible items to the index so a
            // single write-lock acquisition covers the whole batch
            // (spec.md §4.4) without touching entries that were never
            // attempted because the caller cancelled partway through.
            let eligible_ids: Vec<String> = eligible.iter().map(|&i| ids[i].clone()).collect();
            let eligible_vectors: Vec<Vec<f32>> = eligible.iter().map(|&i| vectors[i].clone()).collect();
            let never_cancel = || false;
            let index_ok: Vec<bool> = if let Some(hnsw) = state.index.as_hnsw() {
                hnsw.batch_update(&eligible_ids, &eligible_vectors, &never_cancel)
            } else {
                eligible_ids
                    .iter()
                    .zip(eligible_vectors.iter())
                    .map(|(id, vector)| state.index.update(id, vector).is_ok())
                    .collect()
            };

            let mut results = vec![false; ids.len()];
            for (&orig_idx, ok) in eligible.iter().zip(index_ok) {
                results[orig_idx] = storage_ok[orig_idx] && ok;
            }

            Ok(BatchOutcome {
                results,
                cancelled: stopped,
            })
        })
    }

    /// Deletes `id`, tombstoning it in the index and erasing its storage
    /// entry. Returns `true` iff a live record existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        self.with_state(|state| {
            let storage_existed = state.storage.delete(id);
            let index_existed = state.index.delete(id);
            Ok(storage_existed || index_existed)
        })
    }

    /// Deletes every id in `ids`, polling `cancelled` between items.
    pub fn batch_delete(&self, ids: &[String], cancelled: Option<&dyn Fn() -> bool>) -> Result<BatchOutcome<bool>> {
        self.with_state(|state| {
            let is_cancelled = cancelled.unwrap_or(&|| false);
            let mut results = Vec::with_capacity(ids.len());
            let mut stopped = false;
            for id in ids {
                if stopped || is_cancelled() {
                    stopped = true;
                    results.push(false);
                    continue;
                }
                let storage_existed = state.storage.delete(id);
                let index_existed = state.index.delete(id);
                results.push(storage_existed || index_existed);
            }
            Ok(BatchOutcome {
                results,
                cancelled: stopped,
            })
        })
    }

    /// Bounded enumeration of live ids.
    pub fn list_ids(&self, limit: Option<usize>) -> Result<Vec<String>> {
        self.with_state(|state| Ok(state.storage.list(limit)))
    }

    /// Cursor-paginated enumeration of live ids.
    pub fn list_ids_paginated(&self, page_size: usize, cursor: Option<Cursor>) -> Result<(Vec<String>, Option<Cursor>)> {
        self.with_state(|state| Ok(state.storage.list_paginated(page_size, cursor)))
    }

    /// A scoped, lazy sequence over live ids. Must be closed (or simply
    /// dropped) by the caller.
    pub fn stream_ids(&self) -> Result<RecordStream> {
        self.with_state(|state| Ok(state.storage.stream()))
    }

    /// Trains the attached quantizer on `sample`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if no quantizer is attached, or if
    /// `sample` is empty/inconsistent (propagated from
    /// [`crate::quantizer::Quantizer::train`]).
    pub fn train_quantizer(&self, sample: &[Vec<f32>]) -> Result<()> {
        self.with_state(|state| {
            let quantizer = state
                .quantizer
                .as_ref()
                .ok_or_else(|| Error::Invalid("no quantizer attached".into()))?;
            quantizer.lock().train(sample)
        })
    }

    /// Triggers a compaction pass on the HNSW index if the tombstone
    /// ratio exceeds `config.storage.compaction_threshold` (spec.md §4.4
    /// "Deletion"). A no-op returning `Ok(false)` for the flat index,
    /// which needs no reclamation.
    ///
    /// # Errors
    ///
    /// Propagates a compaction failure (would indicate a bug).
    pub fn maybe_compact(&self) -> Result<bool> {
        self.with_state(|state| {
            if let Some(hnsw) = state.index.as_hnsw() {
                hnsw.maybe_compact(self.config.storage.compaction_threshold)
            } else {
                Ok(false)
            }
        })
    }

    /// Writes a snapshot now, independent of the scheduler (spec.md §4.6
    /// "on explicit `flush()`").
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if no persistence manager is attached.
    /// Returns `Error::Io` on a write failure; per spec.md §7 this does
    /// not poison the in-memory index.
    pub fn flush(&self) -> Result<String> {
        self.with_state(|state| {
            let persistence = state
                .persistence
                .as_ref()
                .ok_or_else(|| Error::Invalid("no persistence manager attached".into()))?;
            let records = self.snapshot_records(state);
            let graph = state.index.as_hnsw().map(HnswIndex::export_snapshot);
            persistence.flush(&SnapshotInput {
                dimensions: self.config.dimensions,
                metric: self.metric(),
                index_type: self.config.index_type,
                hnsw_params: matches!(self.config.index_type, IndexType::Hnsw).then(|| self.config.hnsw.clone()),
                quantizer_params: self.config.quantizer.enabled.then(|| self.config.quantizer.clone()),
                records: &records,
                graph: graph.as_ref(),
            })
        })
    }

    fn snapshot_records(&self, state: &State) -> Vec<VectorRecord> {
        state
            .storage
            .list(None)
            .into_iter()
            .filter_map(|id| state.storage.get(&id).ok())
            .collect()
    }

    fn metric(&self) -> DistanceMetric {
        self.config.hnsw.metric
    }

    /// Starts the persistence manager's background snapshot timer, if
    /// persistence is attached and `snapshot_interval_ms` is configured.
    /// Flushes happen through the same [`Self::flush`] path.
    pub fn start_snapshot_scheduler(self: &Arc<Self>) {
        let Ok(()) = self.with_state(|_| Ok(())) else {
            return;
        };
        let guard = self.state.read();
        let Some(state) = guard.as_ref() else { return };
        let Some(persistence) = state.persistence.clone() else {
            return;
        };
        let db = Arc::clone(self);
        persistence.start_scheduler(move || {
            if let Err(e) = db.flush() {
                tracing::warn!(error = %e, "scheduled snapshot failed");
            }
        });
    }

    /// Aggregate stats across every attached collaborator.
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.with_state(|state| {
            Ok(DatabaseStats {
                storage: state.storage.stats(),
                index: state.index.stats(),
                quantizer: state.quantizer.as_ref().map(|q| q.lock().stats()),
                persistence_enabled: state.persistence.is_some(),
            })
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
