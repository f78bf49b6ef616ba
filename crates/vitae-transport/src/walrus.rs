//! Walrus Blob Client
//!
//! Stores and fetches credential files on Walrus decentralized storage.
//!
//! # Architecture
//!
//! Uploads go to a publisher, downloads come from an aggregator:
//! 1. `PUT {publisher}/v1/blobs?epochs=N` with the raw file bytes
//! 2. The publisher answers with one of three JSON shapes, all carrying a blob id
//! 3. `GET {aggregator}/v1/blobs/{blob_id}` returns the raw bytes
//!
//! Publishers are tried in the configured order; the first success wins and
//! every failure is kept for the aggregate error.
//!
//! # Example
//!
//! ```ignore
//! use vitae_transport::walrus::WalrusClient;
//!
//! let client = WalrusClient::testnet();
//! let blob_id = client.upload(bytes, Some("application/pdf")).await?;
//! let blob = client.download(&blob_id).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};
use vitae_types::ContentAddress;

use crate::content_type::{kind_from_mime, mime_from_disposition, resolve_content_kind, ContentKind};
use crate::http::{run_blocking, BlockingFailure, HttpTransport, UreqTransport};
use crate::network::NetworkEndpoints;

/// Storage epochs requested for every upload unless configured otherwise.
pub const DEFAULT_EPOCHS: u32 = 5;

/// Walrus client with an ordered list of publisher endpoints.
#[derive(Clone)]
pub struct WalrusClient {
    /// Publisher base URLs in failover order (primary first).
    publishers: Vec<String>,
    /// Aggregator base URL (blob reads).
    aggregator: String,
    /// Storage epochs requested on upload.
    epochs: u32,
    /// Upper bound on how long one request may take before we stop waiting.
    request_deadline: Duration,
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for WalrusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalrusClient")
            .field("publishers", &self.publishers)
            .field("aggregator", &self.aggregator)
            .field("epochs", &self.epochs)
            .finish()
    }
}

/// Publisher response. Exactly one of the three shapes is expected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    newly_created: Option<NewlyCreated>,
    already_certified: Option<AlreadyCertified>,
    blob_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    blob_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
}

impl UploadResponse {
    fn into_blob_id(self) -> Option<String> {
        self.newly_created
            .map(|n| n.blob_object.blob_id)
            .or_else(|| self.already_certified.map(|a| a.blob_id))
            .or(self.blob_id)
            .filter(|id| !id.trim().is_empty())
    }
}

/// Normalize any of the publisher's response shapes to a blob id.
pub fn parse_upload_response(body: &[u8]) -> Option<ContentAddress> {
    serde_json::from_slice::<UploadResponse>(body)
        .ok()
        .and_then(UploadResponse::into_blob_id)
}

/// A downloaded blob with its resolved content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedBlob {
    pub bytes: Vec<u8>,
    /// MIME type as reported, or the resolved kind's MIME type when nothing was reported.
    pub content_type: String,
    pub kind: ContentKind,
}

/// Errors from a single aggregator read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStoreError {
    /// The aggregator answered with a non-success status.
    NotFound { address: String, status: u16 },
    /// No HTTP status was received.
    Transport(String),
    /// The request deadline elapsed.
    Timeout(Duration),
}

impl std::fmt::Display for BlobStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobStoreError::NotFound { address, status } => {
                write!(f, "blob {} not found (HTTP {})", address, status)
            }
            BlobStoreError::Transport(msg) => write!(f, "blob download failed: {}", msg),
            BlobStoreError::Timeout(d) => write!(f, "blob download timed out after {}s", d.as_secs()),
        }
    }
}

impl std::error::Error for BlobStoreError {}

/// Why one publisher rejected an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    Transport(String),
    Status { status: u16, body: String },
    InvalidResponse(String),
    Timeout(Duration),
}

impl std::fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            UploadFailure::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
            UploadFailure::InvalidResponse(body) => {
                write!(f, "invalid response format: {}", body)
            }
            UploadFailure::Timeout(d) => write!(f, "timed out after {}s", d.as_secs()),
        }
    }
}

/// One failed attempt against one publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAttemptError {
    pub endpoint: String,
    pub cause: UploadFailure,
}

/// Every configured publisher failed. Carries each cause in attempt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateUploadError {
    pub attempts: Vec<UploadAttemptError>,
}

impl std::fmt::Display for AggregateUploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attempts.is_empty() {
            return write!(f, "Walrus upload failed: no publisher endpoints configured");
        }
        write!(f, "Walrus upload failed.")?;
        for attempt in &self.attempts {
            write!(f, " {} error: {}.", attempt.endpoint, attempt.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateUploadError {}

impl WalrusClient {
    /// Client for the public Walrus testnet endpoints.
    pub fn testnet() -> Self {
        Self::from_endpoints(&NetworkEndpoints::testnet())
    }

    /// Client for Walrus mainnet.
    pub fn mainnet() -> Self {
        Self::from_endpoints(&NetworkEndpoints::mainnet())
    }

    /// Client built from resolved endpoints with the default `ureq` transport.
    pub fn from_endpoints(endpoints: &NetworkEndpoints) -> Self {
        let transport = UreqTransport::from_env();
        let deadline = transport.timeout() + Duration::from_secs(5);
        Self::new(
            endpoints.publishers.clone(),
            endpoints.aggregator.clone(),
            Arc::new(transport),
        )
        .with_epochs(endpoints.epochs)
        .with_request_deadline(deadline)
    }

    /// Custom client with explicit endpoints and transport.
    pub fn new(
        publishers: Vec<String>,
        aggregator: String,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            publishers: publishers
                .into_iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .collect(),
            aggregator: aggregator.trim_end_matches('/').to_string(),
            epochs: DEFAULT_EPOCHS,
            request_deadline: Duration::from_secs(35),
            transport,
        }
    }

    pub fn with_epochs(mut self, epochs: u32) -> Self {
        self.epochs = epochs.max(1);
        self
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn publishers(&self) -> &[String] {
        &self.publishers
    }

    pub fn aggregator(&self) -> &str {
        &self.aggregator
    }

    /// Public URL of a blob on the aggregator.
    pub fn blob_url(&self, address: &str) -> String {
        format!("{}/v1/blobs/{}", self.aggregator, address)
    }

    /// Upload bytes, failing over through the publisher list.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type_hint: Option<&str>,
    ) -> Result<ContentAddress, AggregateUploadError> {
        let content_type = content_type_hint
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes: Arc<[u8]> = Arc::from(bytes);
        let mut attempts = Vec::with_capacity(self.publishers.len());

        for endpoint in &self.publishers {
            match self.upload_to(endpoint, bytes.clone(), &content_type).await {
                Ok(blob_id) => {
                    info!(endpoint = %endpoint, blob_id = %blob_id, size = bytes.len(), "uploaded blob to Walrus");
                    return Ok(blob_id);
                }
                Err(cause) => {
                    warn!(endpoint = %endpoint, error = %cause, "Walrus publisher failed, trying next");
                    attempts.push(UploadAttemptError {
                        endpoint: endpoint.clone(),
                        cause,
                    });
                }
            }
        }

        Err(AggregateUploadError { attempts })
    }

    async fn upload_to(
        &self,
        endpoint: &str,
        bytes: Arc<[u8]>,
        content_type: &str,
    ) -> Result<ContentAddress, UploadFailure> {
        let url = format!("{}/v1/blobs?epochs={}", endpoint, self.epochs);
        debug!(url = %url, "PUT blob");

        let transport = self.transport.clone();
        let content_type = content_type.to_string();
        let reply = run_blocking(self.request_deadline, move || {
            transport.put(&url, &bytes, &content_type)
        })
        .await
        .map_err(|failure| match failure {
            BlockingFailure::TimedOut(d) => UploadFailure::Timeout(d),
            BlockingFailure::Aborted(msg) => UploadFailure::Transport(msg),
        })?
        .map_err(|e| UploadFailure::Transport(e.to_string()))?;

        if !reply.is_success() {
            return Err(UploadFailure::Status {
                status: reply.status,
                body: reply.body_preview(),
            });
        }

        parse_upload_response(&reply.body)
            .ok_or_else(|| UploadFailure::InvalidResponse(reply.body_preview()))
    }

    /// Download a blob and classify its content.
    pub async fn download(&self, address: &str) -> Result<DownloadedBlob, BlobStoreError> {
        let url = self.blob_url(address);
        debug!(url = %url, "GET blob");

        let transport = self.transport.clone();
        let reply = run_blocking(self.request_deadline, move || transport.get(&url))
            .await
            .map_err(|failure| match failure {
                BlockingFailure::TimedOut(d) => BlobStoreError::Timeout(d),
                BlockingFailure::Aborted(msg) => BlobStoreError::Transport(msg),
            })?
            .map_err(|e| BlobStoreError::Transport(e.to_string()))?;

        if !reply.is_success() {
            return Err(BlobStoreError::NotFound {
                address: address.to_string(),
                status: reply.status,
            });
        }

        let header_type = reply
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty());
        let body_type = mime_from_disposition(reply.content_disposition.as_deref());
        let kind = resolve_content_kind(header_type, body_type.as_deref(), &reply.body);
        let content_type = header_type
            .filter(|ct| kind_from_mime(Some(*ct)) == Some(kind))
            .map(str::to_string)
            .or(body_type)
            .unwrap_or_else(|| kind.mime().to_string());

        debug!(address, kind = %kind, size = reply.body.len(), "downloaded blob");
        Ok(DownloadedBlob {
            bytes: reply.body,
            content_type,
            kind,
        })
    }
}
