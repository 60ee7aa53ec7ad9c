//! Binary encodings for the two snapshot payload files (spec.md §6):
//! the vectors file (magic `VECC`) and the HNSW index file (magic
//! `HNS1`). All integers are little-endian. Ids are length-prefixed with
//! a `u16` everywhere in this module, including the index file's
//! `entry_point_id` and per-node ids — spec.md §6 only pins the width for
//! the vectors file's id field; this module applies the same choice
//! uniformly rather than introducing a second width (documented as an
//! Open Question resolution in DESIGN.md).
//!
//! Grounded in the teacher crate's framed binary persistence shape
//! (`agent/snapshot.rs`: magic + version + length-prefixed sections +
//! checksum) and [`super::super::storage::file`]'s write-temp/fsync/
//! rename/fsync-parent-dir protocol.

use crate::error::{Error, Result};
use crate::index::hnsw::{GraphSnapshot, NodeSnapshot};
use crate::point::VectorRecord;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

const VECTORS_MAGIC: &[u8; 4] = b"VECC";
const INDEX_MAGIC: &[u8; 4] = b"HNS1";
const WIRE_VERSION: u32 = 1;
const NO_ENTRY_POINT: u16 = u16::MAX;

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len: u16 = s
        .len()
        .try_into()
        .map_err(|_| Error::Invalid(format!("id too long to persist: {} bytes", s.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_str(buf: &[u8], cursor: &mut usize) -> Result<String> {
    let len = read_u16(buf, cursor)? as usize;
    if buf.len() < *cursor + len {
        return Err(Error::Corruption("truncated string field".into()));
    }
    let s = String::from_utf8(buf[*cursor..*cursor + len].to_vec())
        .map_err(|e| Error::Corruption(format!("invalid utf-8 id: {e}")))?;
    *cursor += len;
    Ok(s)
}

fn read_u16(buf: &[u8], cursor: &mut usize) -> Result<u16> {
    if buf.len() < *cursor + 2 {
        return Err(Error::Corruption("truncated u16 field".into()));
    }
    let v = u16::from_le_bytes(buf[*cursor..*cursor + 2].try_into().unwrap());
    *cursor += 2;
    Ok(v)
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32> {
    if buf.len() < *cursor + 4 {
        return Err(Error::Corruption("truncated u32 field".into()));
    }
    let v = u32::from_le_bytes(buf[*cursor..*cursor + 4].try_into().unwrap());
    *cursor += 4;
    Ok(v)
}

fn read_u64(buf: &[u8], cursor: &mut usize) -> Result<u64> {
    if buf.len() < *cursor + 8 {
        return Err(Error::Corruption("truncated u64 field".into()));
    }
    let v = u64::from_le_bytes(buf[*cursor..*cursor + 8].try_into().unwrap());
    *cursor += 8;
    Ok(v)
}

fn read_u8(buf: &[u8], cursor: &mut usize) -> Result<u8> {
    if buf.len() < *cursor + 1 {
        return Err(Error::Corruption("truncated u8 field".into()));
    }
    let v = buf[*cursor];
    *cursor += 1;
    Ok(v)
}

/// Encodes the vectors file: magic, version, then one length-prefixed
/// record per live entry.
pub(crate) fn encode_vectors(records: &[VectorRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(VECTORS_MAGIC);
    buf.extend_from_slice(&WIRE_VERSION.to_le_bytes());
    for record in records {
        write_str(&mut buf, &record.id)?;
        let vec_len: u32 = record
            .vector
            .len()
            .try_into()
            .map_err(|_| Error::Invalid("vector too long to persist".into()))?;
        buf.extend_from_slice(&vec_len.to_le_bytes());
        for v in &record.vector {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let meta_json = serde_json::to_vec(&record.metadata)
            .map_err(|e| Error::Internal(format!("metadata serialization failed: {e}")))?;
        let meta_len: u32 = meta_json
            .len()
            .try_into()
            .map_err(|_| Error::Invalid("metadata too large to persist".into()))?;
        buf.extend_from_slice(&meta_len.to_le_bytes());
        buf.extend_from_slice(&meta_json);
    }
    Ok(buf)
}

/// Decodes a vectors file produced by [`encode_vectors`].
pub(crate) fn decode_vectors(buf: &[u8]) -> Result<Vec<VectorRecord>> {
    if buf.len() < 8 || &buf[0..4] != VECTORS_MAGIC {
        return Err(Error::Corruption("bad vectors file magic".into()));
    }
    let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    if version != WIRE_VERSION {
        return Err(Error::Corruption(format!("unsupported vectors file version {version}")));
    }

    let mut cursor = 8usize;
    let mut records = Vec::new();
    while cursor < buf.len() {
        let id = read_str(buf, &mut cursor)?;
        let vec_len = read_u32(buf, &mut cursor)? as usize;
        if buf.len() < cursor + vec_len * 4 {
            return Err(Error::Corruption("truncated vector payload".into()));
        }
        let mut vector = Vec::with_capacity(vec_len);
        for i in 0..vec_len {
            let start = cursor + i * 4;
            vector.push(f32::from_le_bytes(buf[start..start + 4].try_into().unwrap()));
        }
        cursor += vec_len * 4;
        let meta_len = read_u32(buf, &mut cursor)? as usize;
        if buf.len() < cursor + meta_len {
            return Err(Error::Corruption("truncated metadata payload".into()));
        }
        let metadata: Map<String, Value> = serde_json::from_slice(&buf[cursor..cursor + meta_len])
            .map_err(|e| Error::Corruption(format!("metadata decode failed: {e}")))?;
        cursor += meta_len;
        records.push(VectorRecord::new(id, vector, metadata));
    }
    Ok(records)
}

/// Encodes the HNSW index file: magic, node count, entry point, every
/// node's id/level/per-level neighbors, then the tombstone id list
/// (spec.md §6 "Index file (HNSW v1)").
pub(crate) fn encode_hnsw_index(snapshot: &GraphSnapshot) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.extend_from_slice(INDEX_MAGIC);

    let node_count: u64 = snapshot.nodes.len() as u64;
    buf.extend_from_slice(&node_count.to_le_bytes());

    match &snapshot.entry_point {
        Some(id) => write_str(&mut buf, id)?,
        None => buf.extend_from_slice(&NO_ENTRY_POINT.to_le_bytes()),
    }

    for node in &snapshot.nodes {
        write_str(&mut buf, &node.id)?;
        let level: u8 = node
            .level
            .try_into()
            .map_err(|_| Error::Invalid(format!("node level {} exceeds u8 range", node.level)))?;
        buf.push(level);
        for neighbors in &node.neighbors {
            let count: u32 = neighbors
                .len()
                .try_into()
                .map_err(|_| Error::Invalid("neighbor list too long to persist".into()))?;
            buf.extend_from_slice(&count.to_le_bytes());
            for id in neighbors {
                write_str(&mut buf, id)?;
            }
        }
    }

    let tombstone_ids: Vec<&str> = snapshot
        .nodes
        .iter()
        .filter(|n| n.tombstoned)
        .map(|n| n.id.as_str())
        .collect();
    buf.extend_from_slice(&(tombstone_ids.len() as u64).to_le_bytes());
    for id in tombstone_ids {
        write_str(&mut buf, id)?;
    }

    Ok(buf)
}

/// Decodes an HNSW index file produced by [`encode_hnsw_index`].
pub(crate) fn decode_hnsw_index(buf: &[u8]) -> Result<GraphSnapshot> {
    if buf.len() < 4 || &buf[0..4] != INDEX_MAGIC {
        return Err(Error::Corruption("bad index file magic".into()));
    }
    let mut cursor = 4usize;
    let node_count = read_u64(buf, &mut cursor)? as usize;

    let entry_point = {
        if buf.len() < cursor + 2 {
            return Err(Error::Corruption("truncated entry point field".into()));
        }
        let peek = u16::from_le_bytes(buf[cursor..cursor + 2].try_into().unwrap());
        if peek == NO_ENTRY_POINT {
            cursor += 2;
            None
        } else {
            Some(read_str(buf, &mut cursor)?)
        }
    };

    let mut nodes = Vec::with_capacity(node_count);
    let mut node_ids = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let id = read_str(buf, &mut cursor)?;
        let level = read_u8(buf, &mut cursor)? as usize;
        let mut neighbors = Vec::with_capacity(level + 1);
        for _ in 0..=level {
            let count = read_u32(buf, &mut cursor)? as usize;
            let mut ids = Vec::with_capacity(count);
            for _ in 0..count {
                ids.push(read_str(buf, &mut cursor)?);
            }
            neighbors.push(ids);
        }
        node_ids.push(id.clone());
        nodes.push(NodeSnapshot {
            id,
            level,
            neighbors,
            tombstoned: false,
        });
    }

    let tombstone_count = read_u64(buf, &mut cursor)? as usize;
    let mut tombstoned: std::collections::HashSet<String> = std::collections::HashSet::with_capacity(tombstone_count);
    for _ in 0..tombstone_count {
        tombstoned.insert(read_str(buf, &mut cursor)?);
    }
    for node in &mut nodes {
        if tombstoned.contains(&node.id) {
            node.tombstoned = true;
        }
    }

    Ok(GraphSnapshot { nodes, entry_point })
}

/// Sha256 of `bytes`, lowercase hex.
pub(crate) fn checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// Writes `bytes` to `path` using the write-temp/fsync/rename/fsync-parent
/// protocol (spec.md §4.6): a crash between temp-write and rename leaves
/// whatever was previously at `path` intact.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("")
    ));
    {
        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir_file) = File::open(parent) {
            let _ = dir_file.sync_all();
        }
    }
    Ok(())
}

pub(crate) fn read_checked(path: &Path, expected_sha256: &str) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let actual = checksum(&buf);
    if actual != expected_sha256 {
        return Err(Error::Corruption(format!(
            "checksum mismatch for {}: expected {expected_sha256}, got {actual}",
            path.display()
        )));
    }
    Ok(buf)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
