//! Credential data model.
//!
//! Descriptors are the local catalog, ledger objects are what the chain
//! reports, and verified records are the result of pairing the two during a
//! reconciliation pass.

use serde::{Deserialize, Serialize};

/// Identifier of a blob in the content-addressed store (a Walrus blob id).
pub type ContentAddress = String;

/// A locally known credential template.
///
/// Loaded once per process from the catalog and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescriptor {
    pub id: String,
    pub title: String,
    pub issuer: String,
    /// Path or URL of the template image shown before anything is minted.
    #[serde(default)]
    pub template_image_ref: String,
}

impl CredentialDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            issuer: issuer.into(),
            template_image_ref: String::new(),
        }
    }
}

/// A credential object as reported by the ledger.
///
/// Optional fields are `None` when no accepted alias carried a usable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCredentialObject {
    pub object_id: String,
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub content_address: Option<ContentAddress>,
    /// Issue time in milliseconds since the Unix epoch.
    pub issue_timestamp: Option<u64>,
    pub owner_address: String,
}

/// Which matching rule paired a ledger object with a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Normalized title and issuer both equal.
    Exact,
    /// Normalized titles equal, issuer ignored.
    TitleOnly,
    /// Long titles where one contains the other.
    Substring,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchTier::Exact => write!(f, "exact"),
            MatchTier::TitleOnly => write!(f, "title-only"),
            MatchTier::Substring => write!(f, "substring"),
        }
    }
}

/// Outcome of pairing one ledger object with one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCredentialRecord {
    pub descriptor_id: String,
    pub object_id: String,
    /// Empty when the ledger object carried no content address.
    pub content_address: ContentAddress,
    pub transaction_id: Option<String>,
    pub minted_at: Option<u64>,
    pub owner_address: String,
    pub tier: MatchTier,
}

impl VerifiedCredentialRecord {
    /// True when the record points at a blob that can be fetched.
    pub fn has_file(&self) -> bool {
        !self.content_address.trim().is_empty()
    }
}

/// The structured "issue credential" call handed to the transaction submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredentialCall {
    pub owner: String,
    pub title: String,
    pub issuer: String,
    pub score: u64,
    pub content_address: ContentAddress,
    pub timestamp_ms: u64,
}

/// Normalize free text for comparison: trim surrounding whitespace and lowercase.
pub fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}
