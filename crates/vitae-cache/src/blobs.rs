//! Blob cache keyed by content address.
//!
//! Layout under the cache root:
//!
//! ```text
//! blobs/aa/bb/<sha256(address)>.bin        raw bytes
//! blobs/aa/bb/<sha256(address)>.meta.json  {contentAddress, contentType, savedAt, size}
//! ```
//!
//! Metadata is written after the bytes, so an entry without metadata is
//! treated as absent. Writers for one address are serialized, and an entry
//! whose recorded `size` disagrees with its data file is treated as absent.

use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::metrics::CacheMetrics;
use crate::paths::{
    atomic_write, atomic_write_json, blob_data_path, blob_meta_path, blobs_root, remove_if_exists,
};

/// Metadata for a cached blob (stored separately from the bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMeta {
    pub content_address: String,
    pub content_type: String,
    /// Milliseconds since the Unix epoch.
    pub saved_at: i64,
    pub size: u64,
}

/// A cached blob (bytes + metadata).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBlob {
    pub content_address: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Milliseconds since the Unix epoch.
    pub saved_at: i64,
}

impl CachedBlob {
    /// A blob stamped with the current time.
    pub fn new(content_address: &str, bytes: Vec<u8>, content_type: &str) -> Self {
        Self {
            content_address: content_address.to_string(),
            bytes,
            content_type: content_type.to_string(),
            saved_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn meta(&self) -> BlobMeta {
        BlobMeta {
            content_address: self.content_address.clone(),
            content_type: self.content_type.clone(),
            saved_at: self.saved_at,
            size: self.bytes.len() as u64,
        }
    }
}

/// Trait for blob caches.
pub trait BlobCache: Send + Sync {
    /// Get a blob. Absent entries are `Ok(None)`.
    fn get(&self, content_address: &str) -> Result<Option<CachedBlob>>;

    /// Store a blob, replacing any existing entry.
    fn put(&self, blob: &CachedBlob) -> Result<()>;

    /// Remove a blob. Removing an absent entry succeeds.
    fn delete(&self, content_address: &str) -> Result<()>;

    /// Check if a blob exists (without loading bytes where possible).
    fn has(&self, content_address: &str) -> bool {
        self.get(content_address)
            .map(|opt| opt.is_some())
            .unwrap_or(false)
    }
}

/// Outcome of a prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Content addresses removed, oldest first.
    pub evicted: Vec<String>,
    pub freed_bytes: u64,
    pub remaining_bytes: u64,
}

/// Filesystem-backed blob cache with sharded directory layout and an optional byte budget.
pub struct FsBlobCache {
    cache_root: Arc<Path>,
    max_bytes: Option<u64>,
    metrics: CacheMetrics,
    prune_lock: Mutex<()>,
    entry_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsBlobCache {
    /// Create a new filesystem blob cache without a budget.
    pub fn new<P: AsRef<Path>>(cache_root: P) -> Result<Self> {
        let cache_root = cache_root.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_root)
            .map_err(|e| anyhow!("Failed to create cache root {}: {}", cache_root.display(), e))?;
        Ok(Self {
            cache_root: Arc::from(cache_root),
            max_bytes: None,
            metrics: CacheMetrics::default(),
            prune_lock: Mutex::new(()),
            entry_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Evict oldest entries whenever the total size exceeds `max_bytes`.
    pub fn with_budget(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Share eviction counters with a caller-owned metrics handle.
    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Get the cache root path.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn max_bytes(&self) -> Option<u64> {
        self.max_bytes
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    /// Lock guarding the data/metadata pair of one address.
    fn entry_lock(&self, content_address: &str) -> Arc<Mutex<()>> {
        self.entry_locks
            .lock()
            .entry(content_address.to_string())
            .or_default()
            .clone()
    }

    /// Metadata of every complete entry, oldest `savedAt` first.
    pub fn entries(&self) -> Result<Vec<BlobMeta>> {
        let mut entries = Vec::new();
        let root = blobs_root(&self.cache_root);
        if !root.exists() {
            return Ok(entries);
        }
        for meta_path in meta_files(&root)? {
            match read_meta(&meta_path) {
                Ok(meta) => entries.push(meta),
                Err(e) => warn!(path = %meta_path.display(), error = %e, "skipping unreadable blob metadata"),
            }
        }
        entries.sort_by(|a, b| {
            a.saved_at
                .cmp(&b.saved_at)
                .then_with(|| a.content_address.cmp(&b.content_address))
        });
        Ok(entries)
    }

    /// Sum of recorded sizes of all entries.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.entries()?.iter().map(|m| m.size).sum())
    }

    /// Evict oldest entries until the cache fits its budget. No budget means no-op.
    pub fn prune(&self) -> Result<PruneReport> {
        self.prune_to_budget(None)
    }

    fn prune_to_budget(&self, keep: Option<&str>) -> Result<PruneReport> {
        let _guard = self.prune_lock.lock();
        let entries = self.entries()?;
        let mut total: u64 = entries.iter().map(|m| m.size).sum();
        let mut report = PruneReport::default();

        let Some(budget) = self.max_bytes else {
            report.remaining_bytes = total;
            return Ok(report);
        };

        for meta in &entries {
            if total <= budget {
                break;
            }
            if keep == Some(meta.content_address.as_str()) {
                continue;
            }
            self.delete(&meta.content_address)?;
            total = total.saturating_sub(meta.size);
            report.freed_bytes += meta.size;
            report.evicted.push(meta.content_address.clone());
        }
        report.remaining_bytes = total;

        if !report.evicted.is_empty() {
            self.metrics.record_evictions(report.evicted.len() as u64);
            info!(
                evicted = report.evicted.len(),
                freed_bytes = report.freed_bytes,
                remaining_bytes = report.remaining_bytes,
                "pruned blob cache"
            );
        }
        Ok(report)
    }
}

impl BlobCache for FsBlobCache {
    fn get(&self, content_address: &str) -> Result<Option<CachedBlob>> {
        let data_path = blob_data_path(&self.cache_root, content_address);
        let meta_path = blob_meta_path(&self.cache_root, content_address);

        let lock = self.entry_lock(content_address);
        let _entry = lock.lock();
        if !data_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let meta = match read_meta(&meta_path) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(content_address, error = %e, "corrupt blob metadata, treating as absent");
                return Ok(None);
            }
        };

        let bytes = match std::fs::read(&data_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow!(
                    "Failed to read blob file {}: {}",
                    data_path.display(),
                    e
                ))
            }
        };
        if bytes.len() as u64 != meta.size {
            warn!(
                content_address,
                recorded = meta.size,
                actual = bytes.len(),
                "blob size does not match metadata, treating as absent"
            );
            return Ok(None);
        }

        Ok(Some(CachedBlob {
            content_address: meta.content_address,
            bytes,
            content_type: meta.content_type,
            saved_at: meta.saved_at,
        }))
    }

    fn put(&self, blob: &CachedBlob) -> Result<()> {
        let data_path = blob_data_path(&self.cache_root, &blob.content_address);
        let meta_path = blob_meta_path(&self.cache_root, &blob.content_address);

        {
            let lock = self.entry_lock(&blob.content_address);
            let _entry = lock.lock();
            atomic_write(&data_path, &blob.bytes)?;
            atomic_write_json(&meta_path, &blob.meta())?;
        }
        debug!(
            content_address = %blob.content_address,
            size = blob.bytes.len(),
            "cached blob"
        );

        if self.max_bytes.is_some() {
            self.prune_to_budget(Some(&blob.content_address))?;
        }
        Ok(())
    }

    fn delete(&self, content_address: &str) -> Result<()> {
        let lock = self.entry_lock(content_address);
        let _entry = lock.lock();
        remove_if_exists(&blob_meta_path(&self.cache_root, content_address))?;
        remove_if_exists(&blob_data_path(&self.cache_root, content_address))?;
        Ok(())
    }

    fn has(&self, content_address: &str) -> bool {
        blob_data_path(&self.cache_root, content_address).exists()
            && blob_meta_path(&self.cache_root, content_address).exists()
    }
}

fn read_meta(path: &Path) -> Result<BlobMeta> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read metadata file {}: {}", path.display(), e))?;
    serde_json::from_str(&json).map_err(|e| anyhow!("Failed to parse metadata JSON: {}", e))
}

/// All `*.meta.json` files under the two shard levels.
fn meta_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for aa in read_dirs(root)? {
        for bb in read_dirs(&aa)? {
            let listing = std::fs::read_dir(&bb)
                .map_err(|e| anyhow!("Failed to list {}: {}", bb.display(), e))?;
            for entry in listing.flatten() {
                let path = entry.path();
                let is_meta = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".meta.json"));
                if is_meta {
                    files.push(path);
                }
            }
        }
    }
    Ok(files)
}

fn read_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let listing =
        std::fs::read_dir(dir).map_err(|e| anyhow!("Failed to list {}: {}", dir.display(), e))?;
    Ok(listing
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect())
}

/// In-memory blob cache.
#[derive(Debug, Default)]
pub struct MemoryBlobCache {
    blobs: RwLock<HashMap<String, CachedBlob>>,
}

impl MemoryBlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobCache for MemoryBlobCache {
    fn get(&self, content_address: &str) -> Result<Option<CachedBlob>> {
        Ok(self.blobs.read().get(content_address).cloned())
    }

    fn put(&self, blob: &CachedBlob) -> Result<()> {
        self.blobs
            .write()
            .insert(blob.content_address.clone(), blob.clone());
        Ok(())
    }

    fn delete(&self, content_address: &str) -> Result<()> {
        self.blobs.write().remove(content_address);
        Ok(())
    }

    fn has(&self, content_address: &str) -> bool {
        self.blobs.read().contains_key(content_address)
    }
}
