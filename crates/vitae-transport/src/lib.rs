//! Vitae Transport Layer
//!
//! Network transport for credential data via Sui JSON-RPC and Walrus.
//!
//! This crate provides:
//! - [`rpc`]: JSON-RPC client for owned objects, single objects and transaction lookups
//! - [`walrus`]: Walrus client for blob upload (publisher failover) and download (aggregator)
//! - [`content_type`]: file type classification for downloaded blobs
//! - [`network`]: endpoint defaults and `VITAE_*` overrides
//!
//! # Example
//!
//! ```ignore
//! use vitae_transport::{NetworkEndpoints, SuiRpcClient, WalrusClient};
//!
//! let endpoints = NetworkEndpoints::from_env();
//! let rpc = SuiRpcClient::new(&endpoints.rpc_url);
//! let owned = rpc
//!     .get_owned_objects("0xabc", &endpoints.credential_struct_type())
//!     .await?;
//!
//! let walrus = WalrusClient::from_endpoints(&endpoints);
//! let address = walrus.upload(bytes, Some("application/pdf")).await?;
//! let blob = walrus.download(&address).await?;
//! ```

pub mod content_type;
pub mod http;
pub mod network;
pub mod rpc;
pub mod walrus;

// Re-export main types for convenience
pub use content_type::{
    download_file_name, mime_from_file_name, resolve_content_kind, ContentKind,
};
pub use http::{HttpReply, HttpTransport, TransportError, UreqTransport};
pub use network::NetworkEndpoints;
pub use rpc::{LedgerQueryError, OwnedObjects, SuiRpcClient};
pub use walrus::{
    AggregateUploadError, BlobStoreError, DownloadedBlob, UploadAttemptError, UploadFailure,
    WalrusClient,
};
