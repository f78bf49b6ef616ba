//! Error types for decoding and reconciliation.

use vitae_transport::{AggregateUploadError, BlobStoreError, LedgerQueryError};

/// Why a raw ledger object could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The response carried no `data` object.
    MissingData,
    /// `data.objectId` is absent or empty.
    MissingObjectId,
    /// `data.content.fields` is absent or not a map.
    MissingFields,
    /// A field is present with a JSON type no alias accepts.
    Malformed {
        field: String,
        expected: &'static str,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingData => write!(f, "object response has no data"),
            ParseError::MissingObjectId => write!(f, "object has no objectId"),
            ParseError::MissingFields => write!(f, "object has no content fields"),
            ParseError::Malformed { field, expected } => {
                write!(f, "field '{}' is not a {}", field, expected)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Session-level failure.
#[derive(Debug)]
pub enum ReconcileError {
    Ledger(LedgerQueryError),
    Parse {
        object_id: Option<String>,
        error: ParseError,
    },
    Blob(BlobStoreError),
    Upload(AggregateUploadError),
    /// The transaction submitter rejected the issue call.
    Submit(String),
    /// No descriptor with this id is in the catalog.
    UnknownDescriptor(String),
    /// The record carries no content address to fetch.
    NoContentAddress { object_id: String },
    /// The owner holds no object matching the descriptor.
    NotOnLedger { descriptor_id: String, owner: String },
    /// Minting needs a transaction submitter and none is configured.
    NoSubmitter,
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Ledger(e) => write!(f, "{}", e),
            ReconcileError::Parse { object_id, error } => match object_id {
                Some(id) => write!(f, "failed to decode object {}: {}", id, error),
                None => write!(f, "failed to decode object: {}", error),
            },
            ReconcileError::Blob(e) => write!(f, "{}", e),
            ReconcileError::Upload(e) => write!(f, "{}", e),
            ReconcileError::Submit(msg) => write!(f, "transaction submission failed: {}", msg),
            ReconcileError::UnknownDescriptor(id) => write!(f, "unknown credential '{}'", id),
            ReconcileError::NoContentAddress { object_id } => {
                write!(f, "object {} has no content address", object_id)
            }
            ReconcileError::NotOnLedger {
                descriptor_id,
                owner,
            } => write!(f, "no credential '{}' owned by {}", descriptor_id, owner),
            ReconcileError::NoSubmitter => write!(f, "no transaction submitter configured"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Ledger(e) => Some(e),
            ReconcileError::Parse { error, .. } => Some(error),
            ReconcileError::Blob(e) => Some(e),
            ReconcileError::Upload(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerQueryError> for ReconcileError {
    fn from(e: LedgerQueryError) -> Self {
        ReconcileError::Ledger(e)
    }
}

impl From<BlobStoreError> for ReconcileError {
    fn from(e: BlobStoreError) -> Self {
        ReconcileError::Blob(e)
    }
}

impl From<AggregateUploadError> for ReconcileError {
    fn from(e: AggregateUploadError) -> Self {
        ReconcileError::Upload(e)
    }
}
