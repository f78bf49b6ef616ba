//! Runtime configuration and store wiring.
//!
//! Values come from `VITAE_*` environment variables with built-in defaults;
//! CLI flags override individual fields after loading.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vitae_cache::{
    CacheMetrics, FsBlobCache, FsKeyValueStore, HiddenSet, KeyValueStore,
    DEFAULT_CACHE_MAX_BYTES,
};
use vitae_reconcile::{BlobResolver, CredentialLocator, ReconcileSession};
use vitae_transport::{NetworkEndpoints, SuiRpcClient, WalrusClient};
use vitae_types::{env_var_or, CredentialDescriptor};

#[derive(Debug, Clone)]
pub struct VitaeConfig {
    pub endpoints: NetworkEndpoints,
    /// Root of all local state (blob cache, hidden set).
    pub state_dir: PathBuf,
    pub cache_max_bytes: u64,
}

impl VitaeConfig {
    pub fn from_env() -> Self {
        let state_dir = std::env::var("VITAE_STATE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_state_dir);
        Self {
            endpoints: NetworkEndpoints::from_env(),
            state_dir,
            cache_max_bytes: env_var_or("VITAE_CACHE_MAX_BYTES", DEFAULT_CACHE_MAX_BYTES),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir.join("cache")
    }

    pub fn open_blob_cache(&self, metrics: CacheMetrics) -> Result<FsBlobCache> {
        let dir = self.cache_dir();
        Ok(FsBlobCache::new(&dir)
            .with_context(|| format!("init blob cache at {}", dir.display()))?
            .with_budget(self.cache_max_bytes)
            .with_metrics(metrics))
    }

    pub fn open_hidden_set(&self) -> Result<HiddenSet> {
        let store: Arc<dyn KeyValueStore> = Arc::new(
            FsKeyValueStore::new(&self.state_dir)
                .with_context(|| format!("init state store at {}", self.state_dir.display()))?,
        );
        HiddenSet::load(store).context("load hidden set")
    }

    pub fn walrus(&self) -> WalrusClient {
        WalrusClient::from_endpoints(&self.endpoints)
    }

    /// Blob resolver over the configured Walrus endpoints and the on-disk cache.
    pub fn blob_resolver(&self) -> Result<BlobResolver> {
        let metrics = CacheMetrics::default();
        let cache = Arc::new(self.open_blob_cache(metrics.clone())?);
        Ok(BlobResolver::new(self.walrus(), cache).with_metrics(metrics))
    }

    /// Session against the configured fullnode with on-disk stores.
    pub fn open_session(&self, descriptors: Vec<CredentialDescriptor>) -> Result<ReconcileSession> {
        let rpc = Arc::new(SuiRpcClient::new(&self.endpoints.rpc_url));
        let locator = CredentialLocator::new(rpc, self.endpoints.credential_struct_type());
        let hidden = Arc::new(self.open_hidden_set()?);
        Ok(ReconcileSession::new(
            descriptors,
            locator,
            self.blob_resolver()?,
            hidden,
        ))
    }
}

impl Default for VitaeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// `<data dir>/vitae`, or `./.vitae` when the platform has no data dir.
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("vitae"))
        .unwrap_or_else(|| Path::new(".vitae").to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitae_cache::BlobCache;

    fn config(dir: &Path) -> VitaeConfig {
        VitaeConfig {
            endpoints: NetworkEndpoints::testnet(),
            state_dir: dir.to_path_buf(),
            cache_max_bytes: 1024,
        }
    }

    #[test]
    fn test_stores_live_under_state_dir() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let config = config(dir.path());

        let hidden = config.open_hidden_set()?;
        hidden.hide("0x1")?;
        assert!(config.open_hidden_set()?.is_hidden("0x1"));

        let cache = config.open_blob_cache(CacheMetrics::default())?;
        assert_eq!(cache.max_bytes(), Some(1024));
        assert!(cache.cache_root().starts_with(dir.path()));
        assert!(!cache.has("anything"));
        Ok(())
    }

    #[test]
    fn test_default_state_dir_ends_with_vitae() {
        let dir = default_state_dir();
        assert!(dir.ends_with("vitae") || dir.ends_with(".vitae"));
    }
}
