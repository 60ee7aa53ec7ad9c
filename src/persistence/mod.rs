//! Persistence manager: periodic or explicit durable snapshots of storage
//! + index state, and recovery on open (spec.md §4.6).
//!
//! - [`manifest`] is the JSON manifest naming a snapshot's sibling files
//!   and their checksums.
//! - [`wire`] is the binary encoding of the vectors and HNSW index files.
//!
//! This module composes the two into [`PersistenceManager`]: `flush()`
//! writes a new snapshot using the write-temp/fsync/rename protocol, and
//! `open()` loads the most recent snapshot whose checksums verify,
//! skipping corrupt ones with a warning (spec.md §4.6 "On open"). An
//! optional background thread calls `flush()` on `snapshot_interval_ms`,
//! stopped on [`PersistenceManager::close`] (spec.md §5 "Resources").

pub(crate) mod manifest;
pub(crate) mod wire;

use crate::config::{HnswConfig, PersistenceConfig, QuantizerConfig};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::hnsw::GraphSnapshot;
use crate::point::VectorRecord;
use manifest::{Manifest, ManifestParams, MANIFEST_VERSION};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Everything a snapshot captures, independent of how storage/index chose
/// to represent it in memory.
pub struct SnapshotInput<'a> {
    /// Declared vector dimension.
    pub dimensions: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// `"flat"` or `"hnsw"`.
    pub index_type: crate::config::IndexType,
    /// HNSW parameters, present iff `index_type == Hnsw`.
    pub hnsw_params: Option<HnswConfig>,
    /// Quantizer configuration, if one is attached.
    pub quantizer_params: Option<QuantizerConfig>,
    /// Every live record, as reported by the storage backend.
    pub records: &'a [VectorRecord],
    /// Graph structure, present iff `index_type == Hnsw`.
    pub graph: Option<&'a GraphSnapshot>,
}

/// What [`PersistenceManager::open`] hands back for the client facade to
/// rehydrate storage and index from.
pub struct RestoredSnapshot {
    /// Declared vector dimension.
    pub dimensions: usize,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// `"flat"` or `"hnsw"`.
    pub index_type: crate::config::IndexType,
    /// HNSW parameters, present iff `index_type == Hnsw`.
    pub hnsw_params: Option<HnswConfig>,
    /// Quantizer configuration, if one was attached.
    pub quantizer_params: Option<QuantizerConfig>,
    /// Every record recorded in the snapshot.
    pub records: Vec<VectorRecord>,
    /// Graph structure, present iff `index_type == Hnsw`.
    pub graph: Option<GraphSnapshot>,
}

struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// Owns the snapshot directory and, optionally, a background timer that
/// calls a caller-supplied flush closure on an interval.
pub struct PersistenceManager {
    dir: PathBuf,
    config: PersistenceConfig,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

impl PersistenceManager {
    /// Creates a manager rooted at `config.snapshot_dir`, creating the
    /// directory if absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be created.
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.snapshot_dir);
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            config,
            scheduler: Mutex::new(None),
        })
    }

    /// Writes a new snapshot: vectors file, optional index file, then the
    /// manifest naming both and their checksums (spec.md §6 "Snapshot
    /// on-disk format"). Uses a timestamp-derived snapshot id so that
    /// `open` can pick the highest by lexicographic/numeric order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` on a filesystem failure. Per spec.md §7, a
    /// failed flush does not poison the in-memory index; the caller may
    /// retry on the next scheduled tick or explicit call.
    pub fn flush(&self, input: &SnapshotInput<'_>) -> Result<String> {
        let snapshot_id = Self::snapshot_id_now();
        let vectors_name = format!("{snapshot_id}.vectors");
        let index_name = format!("{snapshot_id}.index");
        let manifest_name = format!("{snapshot_id}.manifest.json");

        let vectors_bytes = wire::encode_vectors(input.records)?;
        let vectors_sha256 = wire::checksum(&vectors_bytes);
        wire::write_atomic(&self.dir.join(&vectors_name), &vectors_bytes)?;

        let (index_bytes, index_sha256) = match input.graph {
            Some(graph) => {
                let bytes = wire::encode_hnsw_index(graph)?;
                let sha = wire::checksum(&bytes);
                (bytes, sha)
            }
            None => (Vec::new(), wire::checksum(&[])),
        };
        wire::write_atomic(&self.dir.join(&index_name), &index_bytes)?;

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            created_at: Self::now_millis(),
            dimensions: input.dimensions,
            metric: input.metric,
            index_type: input.index_type,
            params: ManifestParams {
                hnsw: input.hnsw_params.clone(),
                quantizer: input.quantizer_params.clone(),
            },
            vectors_file: vectors_name,
            index_file: index_name,
            vectors_sha256,
            index_sha256,
        };
        manifest.write(&self.dir.join(&manifest_name))?;

        Ok(snapshot_id)
    }

    /// Loads the latest valid snapshot in the directory: the manifest with
    /// the highest `created_at` whose sibling files verify against their
    /// recorded checksums. Manifests that fail to parse, or whose
    /// checksums mismatch, are skipped with a `tracing::warn!` rather than
    /// failing the whole scan — an older valid snapshot may still exist
    /// (spec.md §4.6 "corrupt snapshots are skipped with a warning").
    ///
    /// # Errors
    ///
    /// Returns `Error::Corruption` if no valid snapshot is found at all.
    pub fn open(&self) -> Result<RestoredSnapshot> {
        let mut candidates: Vec<(i64, Manifest)> = Vec::new();
        let entries = std::fs::read_dir(&self.dir)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Manifest::read(&path) {
                Ok(manifest) => candidates.push((manifest.created_at, manifest)),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable manifest"),
            }
        }
        candidates.sort_by_key(|(ts, _)| *ts);

        while let Some((_, manifest)) = candidates.pop() {
            match self.load_manifest(&manifest) {
                Ok(restored) => return Ok(restored),
                Err(e) => {
                    tracing::warn!(snapshot_version = manifest.version, error = %e, "skipping corrupt snapshot");
                }
            }
        }
        Err(Error::Corruption("no valid snapshot found".into()))
    }

    fn load_manifest(&self, manifest: &Manifest) -> Result<RestoredSnapshot> {
        let vectors_bytes = wire::read_checked(&self.dir.join(&manifest.vectors_file), &manifest.vectors_sha256)?;
        let records = wire::decode_vectors(&vectors_bytes)?;

        let graph = if manifest.index_type == crate::config::IndexType::Hnsw {
            let index_bytes = wire::read_checked(&self.dir.join(&manifest.index_file), &manifest.index_sha256)?;
            Some(wire::decode_hnsw_index(&index_bytes)?)
        } else {
            None
        };

        Ok(RestoredSnapshot {
            dimensions: manifest.dimensions,
            metric: manifest.metric,
            index_type: manifest.index_type,
            hnsw_params: manifest.params.hnsw.clone(),
            quantizer_params: manifest.params.quantizer.clone(),
            records,
            graph,
        })
    }

    /// Starts a background thread that calls `on_tick` every
    /// `snapshot_interval_ms`. A no-op if the config has no interval
    /// configured, or a scheduler is already running. The thread is
    /// stopped by [`Self::close`]; there is no teacher precedent for this
    /// exact shape, so it is built from the general `Arc<AtomicBool>`
    /// stop-flag idiom used elsewhere in the crate's locking code.
    pub fn start_scheduler(&self, on_tick: impl Fn() + Send + 'static) {
        let Some(interval_ms) = self.config.snapshot_interval_ms else {
            return;
        };
        let mut guard = self.scheduler.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_some() {
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let join = std::thread::Builder::new()
            .name("vekto-snapshot-scheduler".into())
            .spawn(move || {
                let interval = Duration::from_millis(interval_ms);
                while !thread_stop.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);
                    if thread_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    on_tick();
                }
            })
            .ok();
        *guard = Some(SchedulerHandle { stop, join });
    }

    /// Stops the background scheduler, if running, and joins its thread.
    /// Idempotent.
    pub fn close(&self) {
        let handle = self.scheduler.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take();
        if let Some(mut handle) = handle {
            handle.stop.store(true, Ordering::Relaxed);
            if let Some(join) = handle.join.take() {
                let _ = join.join();
            }
        }
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn snapshot_id_now() -> String {
        format!("snapshot-{:020}", Self::now_millis().max(0) as u64)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
