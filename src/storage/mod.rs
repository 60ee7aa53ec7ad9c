//! Storage backends: own vector+metadata records keyed by id (spec.md §4.2).
//!
//! - [`memory`]: in-memory hash map backend.
//! - [`file`]: append-only log file backend with an in-memory offset index.
//!
//! Both variants implement [`StorageBackend`] and reject vectors whose
//! length does not match the declared dimension with `Error::Invalid`.

mod cursor;
#[cfg(feature = "file-storage")]
pub mod file;
pub mod memory;

pub use cursor::Cursor;

use crate::error::Result;
use crate::point::VectorRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Aggregate storage statistics, returned by [`StorageBackend::stats`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of live records.
    pub count: usize,
    /// Declared vector dimension.
    pub dimensions: usize,
    /// Rough estimate of resident memory/disk usage, in bytes.
    pub estimated_bytes: u64,
}

/// A scoped, memory-bounded iterator over live ids.
///
/// Must be consumed via `next()`/`Iterator` and released with [`close`].
/// Safe to consume concurrently with read-only queries, but may skip or
/// repeat ids if the backend is mutated during iteration (spec.md §4.2).
///
/// [`close`]: RecordStream::close
pub struct RecordStream {
    ids: std::vec::IntoIter<String>,
    closed: bool,
}

impl RecordStream {
    pub(crate) fn new(ids: Vec<String>) -> Self {
        Self {
            ids: ids.into_iter(),
            closed: false,
        }
    }

    /// Releases the stream. Idempotent; dropping the stream without
    /// calling this has the same effect.
    pub fn close(mut self) {
        self.closed = true;
    }
}

impl Iterator for RecordStream {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.ids.next()
    }
}

/// Capability set implemented by every storage backend variant.
///
/// Write operations (`put`, `delete`) are atomic with respect to other
/// storage operations; backends provide their own internal synchronization
/// (spec.md §5). Callers must not assume reads observe an in-progress
/// write.
pub trait StorageBackend: Send + Sync {
    /// Writes or overwrites a record. Rejects vectors whose length does
    /// not equal the declared dimension, or that contain non-finite
    /// values, with `Error::Invalid`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` on a dimension mismatch or non-finite
    /// vector element.
    fn put(&self, id: &str, vector: Vec<f32>, metadata: Map<String, Value>) -> Result<()>;

    /// Fetches a record by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no record exists for `id`.
    fn get(&self, id: &str) -> Result<VectorRecord>;

    /// Deletes a record by id. Returns `true` iff an entry existed.
    fn delete(&self, id: &str) -> bool;

    /// Returns whether a record exists for `id`.
    fn contains(&self, id: &str) -> bool;

    /// Bounded enumeration of ids. Order is unspecified but stable within
    /// one backend lifecycle unless mutated.
    fn list(&self, limit: Option<usize>) -> Vec<String>;

    /// Cursor-based pagination. `cursor = None` starts from the
    /// beginning; iteration terminates when the returned next-cursor is
    /// `None`.
    fn list_paginated(&self, page_size: usize, cursor: Option<Cursor>) -> (Vec<String>, Option<Cursor>);

    /// A scoped, lazy sequence of ids. Must be closed by the caller (or
    /// simply dropped).
    fn stream(&self) -> RecordStream;

    /// Aggregate stats for this backend.
    fn stats(&self) -> StorageStats;

    /// Releases backend resources (flushes buffers, closes file handles).
    /// Idempotent.
    fn close(&self);
}

/// Shared pagination helper: both backends materialize a stable sorted
/// snapshot of ids and slice it by cursor offset, so that equal cursors
/// resume the same position as long as no mutation happened in between
/// (spec.md §4.2).
pub(crate) fn paginate(
    sorted_ids: &[String],
    page_size: usize,
    cursor: Option<Cursor>,
) -> (Vec<String>, Option<Cursor>) {
    let start = cursor.map_or(0, Cursor::offset) as usize;
    if start >= sorted_ids.len() || page_size == 0 {
        return (Vec::new(), None);
    }
    let end = (start + page_size).min(sorted_ids.len());
    let page = sorted_ids[start..end].to_vec();
    let next = if end < sorted_ids.len() {
        Some(Cursor::new(end as u64))
    } else {
        None
    };
    (page, next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_exhausts_in_expected_page_count() {
        let ids: Vec<String> = (0..667).map(|i| format!("{i:05}")).collect();
        let mut cursor = None;
        let mut total = 0;
        let mut pages = 0;
        loop {
            let (page, next) = paginate(&ids, 100, cursor);
            total += page.len();
            pages += 1;
            if next.is_none() {
                break;
            }
            cursor = next;
        }
        assert_eq!(total, 667);
        assert_eq!(pages, 7);
    }

    #[test]
    fn paginate_empty_input_terminates_immediately() {
        let ids: Vec<String> = Vec::new();
        let (page, next) = paginate(&ids, 10, None);
        assert!(page.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn record_stream_yields_all_then_stops() {
        let stream = RecordStream::new(vec!["a".into(), "b".into()]);
        let collected: Vec<String> = stream.collect();
        assert_eq!(collected, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn record_stream_close_stops_iteration() {
        let mut stream = RecordStream::new(vec!["a".into(), "b".into()]);
        assert_eq!(stream.next(), Some("a".to_string()));
        stream.close();
    }
}
