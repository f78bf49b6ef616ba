//! Credential reconciliation for vitae.
//!
//! Pairs the local credential catalog with what the ledger actually holds:
//!
//! ```text
//! catalog ──┐
//!           ├─> matcher ─> verified records ─> blob resolver (cache, then Walrus)
//! locator ──┘                    │
//!                                └─> verification / mint state
//! ```
//!
//! - [`locator`]: list and decode an owner's credential objects
//! - [`matcher`]: tiered title matching and transaction-id lookup
//! - [`state`]: single-flight verification and mint state per credential
//! - [`resolver`]: cache-first blob reads
//! - [`session`]: re-entrant passes tying it all together

pub mod errors;
pub mod locator;
pub mod matcher;
pub mod resolver;
pub mod session;
pub mod state;

pub use errors::{ParseError, ReconcileError};
pub use locator::{
    decode_credential_object, CredentialLocator, LedgerSource, LocatorReport, SkippedObject,
};
pub use matcher::{
    match_credentials, resolve_transaction_ids, FailureStage, ItemFailure, MatchReport,
};
pub use resolver::{BlobResolver, ResolvedBlob};
pub use session::{
    MintOutcome, PassOutcome, ReconcileReport, ReconcileSession, TransactionSubmitter, VerifyHint,
};
pub use state::{CredentialStateMachine, CredentialStatus, MintState, VerificationState};
