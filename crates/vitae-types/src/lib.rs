//! Shared types for the vitae workspace.
//!
//! This crate holds the credential data model used by the transport, cache and
//! reconciliation crates, so none of them has to depend on another just to
//! name a descriptor or a ledger object.
//!
//! - [`credential`]: descriptors, ledger objects, verified records
//! - [`address`]: Sui address normalization
//! - [`env_utils`]: environment variable parsing with defaults

pub mod address;
pub mod credential;
pub mod env_utils;

pub use address::normalize_address;
pub use credential::{
    normalize_text, ContentAddress, CredentialDescriptor, IssueCredentialCall,
    LedgerCredentialObject, MatchTier, VerifiedCredentialRecord,
};
pub use env_utils::{env_list, env_string_or, env_var, env_var_or};
