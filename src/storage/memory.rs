//! In-memory storage backend: a hash map held behind a single read-write
//! lock, consistent with spec.md §4.2's "mapping id→record held in a hash
//! map".

use super::{paginate, Cursor, RecordStream, StorageBackend, StorageStats};
use crate::distance::all_finite;
use crate::error::{Error, Result};
use crate::point::VectorRecord;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

/// In-memory storage backend.
pub struct MemoryStorage {
    dimensions: usize,
    records: RwLock<FxHashMap<String, VectorRecord>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory backend for the given vector dimension.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            records: RwLock::new(FxHashMap::default()),
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

    /// A sorted snapshot of live ids, used for deterministic pagination.
    fn sorted_ids(&self) -> Vec<String> {
        let records = self.records.read();
        let mut ids: Vec<String> = records.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}

impl StorageBackend for MemoryStorage {
    fn put(&self, id: &str, vector: Vec<f32>, metadata: Map<String, Value>) -> Result<()> {
        self.validate(&vector)?;
        let record = VectorRecord::new(id.to_string(), vector, metadata);
        self.records.write().insert(id.to_string(), record);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<VectorRecord> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> bool {
        self.records.write().remove(id).is_some()
    }

    fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }

    fn list(&self, limit: Option<usize>) -> Vec<String> {
        let ids = self.sorted_ids();
        match limit {
            Some(n) => ids.into_iter().take(n).collect(),
            None => ids,
        }
    }

    fn list_paginated(&self, page_size: usize, cursor: Option<Cursor>) -> (Vec<String>, Option<Cursor>) {
        paginate(&self.sorted_ids(), page_size, cursor)
    }

    fn stream(&self) -> RecordStream {
        RecordStream::new(self.sorted_ids())
    }

    fn stats(&self) -> StorageStats {
        let records = self.records.read();
        let estimated_bytes = records
            .values()
            .map(|r| (r.vector.len() * 4 + r.id.len()) as u64)
            .sum();
        StorageStats {
            count: records.len(),
            dimensions: self.dimensions,
            estimated_bytes,
        }
    }

    fn close(&self) {
        // Nothing to release: no file handles, no background threads.
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
