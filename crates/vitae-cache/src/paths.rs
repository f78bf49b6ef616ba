//! Path utilities for sharded filesystem layout.

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hash a content address to a 64-character lowercase hex file stem.
///
/// Blob ids are case-sensitive base64; the stem must survive case-folding filesystems.
pub fn blob_file_stem(content_address: &str) -> String {
    hex::encode(Sha256::digest(content_address.as_bytes()))
}

/// Get the shard path components (aa/bb) for a content address.
pub fn blob_shard_path(content_address: &str) -> (String, String) {
    let stem = blob_file_stem(content_address);
    (stem[0..2].to_string(), stem[2..4].to_string())
}

/// Directory holding every cached blob.
pub fn blobs_root(cache_root: &Path) -> PathBuf {
    cache_root.join("blobs")
}

/// Get the full filesystem path for a blob's bytes.
pub fn blob_data_path(cache_root: &Path, content_address: &str) -> PathBuf {
    let (aa, bb) = blob_shard_path(content_address);
    blobs_root(cache_root)
        .join(aa)
        .join(bb)
        .join(format!("{}.bin", blob_file_stem(content_address)))
}

/// Get the full filesystem path for a blob's metadata file.
pub fn blob_meta_path(cache_root: &Path, content_address: &str) -> PathBuf {
    let (aa, bb) = blob_shard_path(content_address);
    blobs_root(cache_root)
        .join(aa)
        .join(bb)
        .join(format!("{}.meta.json", blob_file_stem(content_address)))
}

/// Get the filesystem path for a key/value entry.
///
/// Plain keys (`[A-Za-z0-9._-]`) are kept readable; anything else is hashed.
pub fn kv_path(root: &Path, key: &str) -> PathBuf {
    let plain = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    let stem = if plain {
        key.to_string()
    } else {
        blob_file_stem(key)
    };
    root.join("kv").join(format!("{}.json", stem))
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to a unique .tmp, then rename).
///
/// Concurrent writers to the same path each use their own temp file; the last
/// rename wins and readers never observe a partial file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.{}-{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp"),
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&tmp_path, contents)
        .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

/// Write a JSON file atomically (compact format, no pretty printing).
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}

/// Remove a file, treating "not found" as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow!("Failed to remove {}: {}", path.display(), e)),
    }
}
