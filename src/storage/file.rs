//! File-backed storage backend: an append-only log plus an in-memory
//! offset index, modeled on the teacher crate's `storage/mmap.rs` and
//! `storage/log_payload.rs`.
//!
//! Each record is a length-prefixed frame: a one-byte tag (`1` = live
//! record, `0` = tombstone), the id, and — for live records — the vector
//! and JSON metadata. Deletes append a tombstone frame rather than
//! rewriting the file; [`FileStorage::compact`] is the only way to reclaim
//! space from deleted/overwritten records.

use super::{paginate, Cursor, RecordStream, StorageBackend, StorageStats};
use crate::config::FsyncPolicy;
use crate::distance::all_finite;
use crate::error::{Error, Result};
use crate::point::VectorRecord;
use memmap2::Mmap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const TAG_LIVE: u8 = 1;
const TAG_TOMBSTONE: u8 = 0;

struct IndexEntry {
    offset: u64,
    len: u64,
}

/// File-backed storage backend.
pub struct FileStorage {
    dir: PathBuf,
    dimensions: usize,
    fsync_policy: FsyncPolicy,
    log_path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    index: RwLock<FxHashMap<String, IndexEntry>>,
    mmap: RwLock<Option<Mmap>>,
    mapped_len: RwLock<u64>,
    last_fsync: Mutex<Instant>,
}

impl FileStorage {
    /// Opens (creating if absent) a file-backed backend rooted at `dir`,
    /// replaying the log to rebuild the in-memory offset index.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on filesystem failures and `Error::Corruption`
    /// if the log is truncated mid-record.
    pub fn open(dir: impl AsRef<Path>, dimensions: usize, fsync_policy: FsyncPolicy) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let log_path = dir.join("records.log");

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&log_path)?;

        let index = Self::replay(&log_path)?;

        Ok(Self {
            dir,
            dimensions,
            fsync_policy,
            log_path,
            writer: Mutex::new(BufWriter::new(file)),
            index: RwLock::new(index),
            mmap: RwLock::new(None),
            mapped_len: RwLock::new(0),
            last_fsync: Mutex::new(Instant::now()),
        })
    }

    /// Replays the log file from scratch, returning the offset index of
    /// the latest live record for every id (tombstones remove prior
    /// entries).
    fn replay(log_path: &Path) -> Result<FxHashMap<String, IndexEntry>> {
        let mut index = FxHashMap::default();
        let Ok(mut file) = File::open(log_path) else {
            return Ok(index);
        };
        let len = file.metadata()?.len();
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf)?;

        let mut pos = 0u64;
        while (pos as usize) < buf.len() {
            let start = pos as usize;
            let Some((id, record_len)) = parse_frame_header(&buf[start..]) else {
                return Err(Error::Corruption(format!(
                    "truncated record at offset {pos}"
                )));
            };
            let tag = buf[start];
            if tag == TAG_LIVE {
                index.insert(
                    id,
                    IndexEntry {
                        offset: pos,
                        len: record_len,
                    },
                );
            } else {
                index.remove(&id);
            }
            pos += record_len;
        }
        Ok(index)
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

    fn append_frame(&self, frame: &[u8]) -> Result<u64> {
        let mut writer = self.writer.lock();
        let offset = writer.get_ref().metadata()?.len();
        writer.write_all(frame)?;
        writer.flush()?;
        self.maybe_fsync(&mut writer)?;
        Ok(offset)
    }

    fn maybe_fsync(&self, writer: &mut BufWriter<File>) -> Result<()> {
        match self.fsync_policy {
            FsyncPolicy::Never => Ok(()),
            FsyncPolicy::PerWrite => {
                writer.get_ref().sync_data()?;
                Ok(())
            }
            FsyncPolicy::PeriodicMs(ms) => {
                let mut last = self.last_fsync.lock();
                if last.elapsed() >= Duration::from_millis(ms) {
                    writer.get_ref().sync_data()?;
                    *last = Instant::now();
                }
                Ok(())
            }
        }
    }

    /// Ensures the read-side mapping covers the current file length,
    /// remapping if the file has grown since the last read.
    fn ensure_mapped(&self) -> Result<()> {
        let current_len = self.log_path.metadata().map(|m| m.len()).unwrap_or(0);
        if *self.mapped_len.read() >= current_len && self.mmap.read().is_some() {
            return Ok(());
        }
        if current_len == 0 {
            *self.mmap.write() = None;
            *self.mapped_len.write() = 0;
            return Ok(());
        }
        let file = File::open(&self.log_path)?;
        // SAFETY: the log file is append-only; bytes already written are
        // never mutated in place, only tombstoned by a later append, so a
        // concurrent writer cannot invalidate previously-mapped pages.
        let mapped = unsafe { Mmap::map(&file)? };
        *self.mmap.write() = Some(mapped);
        *self.mapped_len.write() = current_len;
        Ok(())
    }

    fn read_record(&self, entry: &IndexEntry) -> Result<VectorRecord> {
        self.ensure_mapped()?;
        let guard = self.mmap.read();
        let mmap = guard
            .as_ref()
            .ok_or_else(|| Error::Internal("mmap missing after ensure_mapped".into()))?;
        let start = entry.offset as usize;
        let end = (entry.offset + entry.len) as usize;
        if end > mmap.len() {
            return Err(Error::Corruption("record extends past file end".into()));
        }
        decode_live_frame(&mmap[start..end])
    }

    fn sorted_ids(&self) -> Vec<String> {
        let index = self.index.read();
        let mut ids: Vec<String> = index.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Rewrites the log, dropping tombstoned entries, reclaiming disk
    /// space. Uses the write-protocol from spec.md §4.6: write to a temp
    /// path, fsync, rename into place, fsync the parent directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on filesystem failure.
    pub fn compact(&self) -> Result<()> {
        let tmp_path = self.dir.join("records.log.compact");
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            let mut new_index = FxHashMap::default();
            let mut writer = self.writer.lock();
            writer.flush()?;
            let index = self.index.read();
            self.ensure_mapped()?;
            let guard = self.mmap.read();
            if let Some(mmap) = guard.as_ref() {
                for (id, entry) in index.iter() {
                    let start = entry.offset as usize;
                    let end = (entry.offset + entry.len) as usize;
                    let new_offset = tmp.stream_position()?;
                    tmp.write_all(&mmap[start..end])?;
                    new_index.insert(
                        id.clone(),
                        IndexEntry {
                            offset: new_offset,
                            len: entry.len,
                        },
                    );
                }
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
            drop(guard);
            drop(index);
            *self.index.write() = new_index;

            std::fs::rename(&tmp_path, &self.log_path)?;
            if let Some(parent) = self.log_path.parent() {
                if let Ok(dir_file) = File::open(parent) {
                    let _ = dir_file.sync_all();
                }
            }
            *writer = BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .append(true)
                    .open(&self.log_path)?,
            );
        }
        *self.mmap.write() = None;
        *self.mapped_len.write() = 0;
        Ok(())
    }
}

fn encode_live_frame(id: &str, vector: &[f32], metadata: &Map<String, Value>) -> Result<Vec<u8>> {
    let meta_json = serde_json::to_vec(metadata)
        .map_err(|e| Error::Internal(format!("metadata serialization failed: {e}")))?;
    let mut frame = Vec::with_capacity(1 + 4 + id.len() + 4 + vector.len() * 4 + 4 + meta_json.len());
    frame.push(TAG_LIVE);
    frame.extend_from_slice(&(id.len() as u32).to_le_bytes());
    frame.extend_from_slice(id.as_bytes());
    frame.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    for v in vector {
        frame.extend_from_slice(&v.to_le_bytes());
    }
    frame.extend_from_slice(&(meta_json.len() as u32).to_le_bytes());
    frame.extend_from_slice(&meta_json);
    Ok(frame)
}

fn encode_tombstone_frame(id: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + 4 + id.len());
    frame.push(TAG_TOMBSTONE);
    frame.extend_from_slice(&(id.len() as u32).to_le_bytes());
    frame.extend_from_slice(id.as_bytes());
    frame
}

/// Parses just enough of a frame to know its id and total length, without
/// decoding the payload. Returns `None` if the buffer is too short (a
/// truncated trailing write).
fn parse_frame_header(buf: &[u8]) -> Option<(String, u64)> {
    if buf.len() < 5 {
        return None;
    }
    let tag = buf[0];
    let id_len = u32::from_le_bytes(buf[1..5].try_into().ok()?) as usize;
    if buf.len() < 5 + id_len {
        return None;
    }
    let id = String::from_utf8(buf[5..5 + id_len].to_vec()).ok()?;
    if tag == TAG_TOMBSTONE {
        return Some((id, (5 + id_len) as u64));
    }
    let mut cursor = 5 + id_len;
    if buf.len() < cursor + 4 {
        return None;
    }
    let vec_len = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().ok()?) as usize;
    cursor += 4 + vec_len * 4;
    if buf.len() < cursor + 4 {
        return None;
    }
    let meta_len = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().ok()?) as usize;
    cursor += 4 + meta_len;
    if buf.len() < cursor {
        return None;
    }
    Some((id, cursor as u64))
}

fn decode_live_frame(buf: &[u8]) -> Result<VectorRecord> {
    let tag = buf[0];
    if tag != TAG_LIVE {
        return Err(Error::Internal("attempted to decode a tombstone".into()));
    }
    let id_len = u32::from_le_bytes(buf[1..5].try_into().unwrap()) as usize;
    let mut cursor = 5;
    let id = String::from_utf8_lossy(&buf[cursor..cursor + id_len]).into_owned();
    cursor += id_len;

    let vec_len = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap()) as usize;
    cursor += 4;
    let mut vector = Vec::with_capacity(vec_len);
    for i in 0..vec_len {
        let start = cursor + i * 4;
        vector.push(f32::from_le_bytes(buf[start..start + 4].try_into().unwrap()));
    }
    cursor += vec_len * 4;

    let meta_len = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap()) as usize;
    cursor += 4;
    let metadata: Map<String, Value> = serde_json::from_slice(&buf[cursor..cursor + meta_len])
        .map_err(|e| Error::Corruption(format!("metadata decode failed: {e}")))?;

    Ok(VectorRecord::new(id, vector, metadata))
}

impl StorageBackend for FileStorage {
    fn put(&self, id: &str, vector: Vec<f32>, metadata: Map<String, Value>) -> Result<()> {
        self.validate(&vector)?;
        let frame = encode_live_frame(id, &vector, &metadata)?;
        let offset = self.append_frame(&frame)?;
        self.index.write().insert(
            id.to_string(),
            IndexEntry {
                offset,
                len: frame.len() as u64,
            },
        );
        Ok(())
    }

    fn get(&self, id: &str) -> Result<VectorRecord> {
        let offset = {
            let index = self.index.read();
            let entry = index.get(id).ok_or_else(|| Error::NotFound(id.to_string()))?;
            IndexEntry {
                offset: entry.offset,
                len: entry.len,
            }
        };
        self.read_record(&offset)
    }

    fn delete(&self, id: &str) -> bool {
        let existed = self.index.write().remove(id).is_some();
        if existed {
            let frame = encode_tombstone_frame(id);
            // Best-effort: a failed tombstone append leaves the id absent
            // from the live index already, so readers will not observe it
            // regardless of whether the durable tombstone landed.
            let _ = self.append_frame(&frame);
        }
        existed
    }

    fn contains(&self, id: &str) -> bool {
        self.index.read().contains_key(id)
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
        let index = self.index.read();
        let estimated_bytes = index
            .values()
            .map(|e| e.len)
            .sum::<u64>();
        StorageStats {
            count: index.len(),
            dimensions: self.dimensions,
            estimated_bytes,
        }
    }

    fn close(&self) {
        if let Some(mut writer) = self.writer.try_lock_for(Duration::from_millis(100)) {
            let _ = writer.flush();
            let _ = writer.get_ref().sync_all();
        }
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
