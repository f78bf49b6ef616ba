//! Local persistence for vitae.
//!
//! This crate provides:
//! - `FsBlobCache`: Sharded filesystem storage for `content address` -> file bytes
//! - `MemoryBlobCache`: In-memory blob cache for tests and short-lived sessions
//! - `FsKeyValueStore` / `MemoryKeyValueStore`: small string values under fixed keys
//! - `HiddenSet`: the locally hidden credential ids, persisted on every mutation

pub mod blobs;
pub mod hidden;
pub mod kv;
pub mod metrics;
pub mod paths;

pub use blobs::{BlobCache, BlobMeta, CachedBlob, FsBlobCache, MemoryBlobCache, PruneReport};
pub use hidden::{HiddenSet, HIDDEN_SET_KEY};
pub use kv::{FsKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use metrics::{CacheMetrics, MetricsSnapshot};

/// Default blob cache budget in bytes (`VITAE_CACHE_MAX_BYTES`).
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 256 * 1024 * 1024;
