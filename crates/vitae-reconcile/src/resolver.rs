//! Cache-first blob reads.

use std::sync::Arc;

use tracing::{debug, warn};
use vitae_cache::{BlobCache, CacheMetrics, CachedBlob};
use vitae_transport::{resolve_content_kind, ContentKind, WalrusClient};

use crate::errors::ReconcileError;

/// A credential file ready to display or save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBlob {
    pub content_address: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub kind: ContentKind,
    pub from_cache: bool,
}

/// Reads blobs from the local cache, falling back to the aggregator.
#[derive(Clone)]
pub struct BlobResolver {
    walrus: WalrusClient,
    cache: Arc<dyn BlobCache>,
    metrics: CacheMetrics,
}

impl BlobResolver {
    pub fn new(walrus: WalrusClient, cache: Arc<dyn BlobCache>) -> Self {
        Self {
            walrus,
            cache,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn walrus(&self) -> &WalrusClient {
        &self.walrus
    }

    pub fn cache(&self) -> &Arc<dyn BlobCache> {
        &self.cache
    }

    /// Local copy if present and non-empty, otherwise download and cache.
    ///
    /// Cache read and write failures are logged and never fail the read.
    pub async fn resolve(&self, content_address: &str) -> Result<ResolvedBlob, ReconcileError> {
        let content_address = content_address.trim();

        match self.cache.get(content_address) {
            Ok(Some(cached)) if !cached.bytes.is_empty() => {
                self.metrics.record_hit();
                let kind = resolve_content_kind(Some(&cached.content_type), None, &cached.bytes);
                debug!(content_address, kind = %kind, "blob served from cache");
                return Ok(ResolvedBlob {
                    content_address: cached.content_address,
                    bytes: cached.bytes,
                    content_type: cached.content_type,
                    kind,
                    from_cache: true,
                });
            }
            Ok(_) => {}
            Err(e) => warn!(content_address, error = %e, "blob cache read failed"),
        }
        self.metrics.record_miss();

        let downloaded = self.walrus.download(content_address).await?;
        self.metrics.record_download();

        let entry = CachedBlob::new(
            content_address,
            downloaded.bytes.clone(),
            &downloaded.content_type,
        );
        if let Err(e) = self.cache.put(&entry) {
            warn!(content_address, error = %e, "failed to cache downloaded blob");
        }

        Ok(ResolvedBlob {
            content_address: content_address.to_string(),
            bytes: downloaded.bytes,
            content_type: downloaded.content_type,
            kind: downloaded.kind,
            from_cache: false,
        })
    }
}
