//! Pairing ledger objects with catalog descriptors.
//!
//! Matching is by title, with a three-tier fallback:
//!
//! | Tier | Rule |
//! |------|------|
//! | exact | normalized title and issuer equal |
//! | title-only | normalized titles equal |
//! | substring | both titles longer than 10 chars and one contains the other |
//!
//! For each object, descriptors are tried in catalog order and each descriptor
//! is tried against the tiers in order. The first descriptor that qualifies at
//! any tier decides, even when a later descriptor would match at a stricter
//! tier. A descriptor is claimed by at most one object per owner; later objects
//! resolving to a claimed descriptor are reported unmatched.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};
use vitae_types::{
    normalize_text, CredentialDescriptor, LedgerCredentialObject, MatchTier,
    VerifiedCredentialRecord,
};

use crate::locator::LedgerSource;

/// Titles must exceed this many characters to take part in substring matching.
pub const SUBSTRING_MIN_CHARS: usize = 10;

/// Concurrent transaction lookups per pass.
pub const LOOKUP_CONCURRENCY: usize = 8;

/// Result of one matching pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// One record per matched object, in input order.
    pub records: Vec<VerifiedCredentialRecord>,
    pub unmatched: Vec<LedgerCredentialObject>,
}

/// A per-item failure that did not abort the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub object_id: Option<String>,
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The owner listing was cut short; the pass is partial.
    Listing,
    Decode,
    TransactionLookup,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Listing => write!(f, "listing"),
            FailureStage::Decode => write!(f, "decode"),
            FailureStage::TransactionLookup => write!(f, "transaction lookup"),
        }
    }
}

/// Tier at which `descriptor` matches `object`, if any.
pub fn match_tier(
    descriptor: &CredentialDescriptor,
    object: &LedgerCredentialObject,
) -> Option<MatchTier> {
    let object_title = normalize_text(object.title.as_deref().unwrap_or_default());
    let descriptor_title = normalize_text(&descriptor.title);
    if object_title.is_empty() || descriptor_title.is_empty() {
        return None;
    }

    let object_issuer = normalize_text(object.issuer.as_deref().unwrap_or_default());
    if object_title == descriptor_title && object_issuer == normalize_text(&descriptor.issuer) {
        return Some(MatchTier::Exact);
    }
    if object_title == descriptor_title {
        return Some(MatchTier::TitleOnly);
    }
    if object_title.chars().count() > SUBSTRING_MIN_CHARS
        && descriptor_title.chars().count() > SUBSTRING_MIN_CHARS
        && (object_title.contains(&descriptor_title) || descriptor_title.contains(&object_title))
    {
        return Some(MatchTier::Substring);
    }
    None
}

/// First descriptor in catalog order that matches the object at any tier.
pub fn find_descriptor<'a>(
    descriptors: &'a [CredentialDescriptor],
    object: &LedgerCredentialObject,
) -> Option<(&'a CredentialDescriptor, MatchTier)> {
    descriptors
        .iter()
        .find_map(|descriptor| match_tier(descriptor, object).map(|tier| (descriptor, tier)))
}

/// Pair ledger objects with descriptors. Deterministic; no ledger access.
pub fn match_credentials(
    descriptors: &[CredentialDescriptor],
    objects: &[LedgerCredentialObject],
) -> MatchReport {
    let mut report = MatchReport::default();
    let mut claimed: HashSet<(&str, &str)> = HashSet::new();

    for object in objects {
        let Some((descriptor, tier)) = find_descriptor(descriptors, object) else {
            debug!(
                object_id = %object.object_id,
                title = object.title.as_deref().unwrap_or(""),
                "no descriptor matches ledger object"
            );
            report.unmatched.push(object.clone());
            continue;
        };

        if !claimed.insert((descriptor.id.as_str(), object.owner_address.as_str())) {
            debug!(
                object_id = %object.object_id,
                descriptor_id = %descriptor.id,
                "descriptor already claimed in this pass"
            );
            report.unmatched.push(object.clone());
            continue;
        }

        debug!(
            object_id = %object.object_id,
            descriptor_id = %descriptor.id,
            tier = %tier,
            "matched ledger object"
        );
        report.records.push(VerifiedCredentialRecord {
            descriptor_id: descriptor.id.clone(),
            object_id: object.object_id.clone(),
            content_address: object.content_address.clone().unwrap_or_default(),
            transaction_id: None,
            minted_at: object.issue_timestamp,
            owner_address: object.owner_address.clone(),
            tier,
        });
    }
    report
}

/// Fill `transaction_id` for every record by looking up its creating transaction.
///
/// Lookups run concurrently. Failures leave the field empty and are returned;
/// nothing is retried.
pub async fn resolve_transaction_ids(
    source: &dyn LedgerSource,
    records: &mut [VerifiedCredentialRecord],
) -> Vec<ItemFailure> {
    let results: Vec<_> = stream::iter(records.iter())
        .map(|record| source.creating_transaction(&record.object_id))
        .buffered(LOOKUP_CONCURRENCY)
        .collect()
        .await;

    let mut failures = Vec::new();
    for (record, result) in records.iter_mut().zip(results) {
        match result {
            Ok(digest) => record.transaction_id = digest,
            Err(e) => {
                warn!(object_id = %record.object_id, error = %e, "transaction lookup failed");
                failures.push(ItemFailure {
                    object_id: Some(record.object_id.clone()),
                    stage: FailureStage::TransactionLookup,
                    message: e.to_string(),
                });
            }
        }
    }
    failures
}
