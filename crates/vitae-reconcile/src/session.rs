//! Reconciliation session: one catalog, one ledger, one set of local stores.
//!
//! The session owns everything a wallet view needs between passes:
//! - the descriptor catalog
//! - the locator and its ledger source
//! - the blob resolver (Walrus + local cache)
//! - the hidden set
//! - verification/mint state, partitioned by owner
//!
//! Passes are re-entrant. Each pass for an owner is stamped with a generation;
//! when a newer pass for the same owner was dispatched while an older one was
//! still running, the older one returns [`PassOutcome::Superseded`] and its
//! results are discarded. The generation check and the publication of a
//! pass's results happen under one lock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use vitae_cache::HiddenSet;
use vitae_types::{
    normalize_address, CredentialDescriptor, IssueCredentialCall, LedgerCredentialObject,
    VerifiedCredentialRecord,
};

use crate::errors::ReconcileError;
use crate::locator::CredentialLocator;
use crate::matcher::{match_credentials, resolve_transaction_ids, FailureStage, ItemFailure};
use crate::resolver::{BlobResolver, ResolvedBlob};
use crate::state::{CredentialStateMachine, CredentialStatus, MintState, VerificationState};

/// Score passed to every issue call.
pub const DEFAULT_SCORE: u64 = 100;

/// Submits the "issue credential" transaction on the user's behalf.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Sign and execute the call; returns the transaction digest.
    async fn submit_issue_credential(&self, call: &IssueCredentialCall) -> anyhow::Result<String>;
}

/// Everything one completed pass learned about an owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub owner: String,
    pub records: Vec<VerifiedCredentialRecord>,
    pub unmatched: Vec<LedgerCredentialObject>,
    pub failures: Vec<ItemFailure>,
}

impl ReconcileReport {
    pub fn record_for(&self, descriptor_id: &str) -> Option<&VerifiedCredentialRecord> {
        self.records.iter().find(|r| r.descriptor_id == descriptor_id)
    }

    /// Records whose object is not hidden.
    pub fn visible<'a>(&'a self, hidden: &HiddenSet) -> Vec<&'a VerifiedCredentialRecord> {
        self.records
            .iter()
            .filter(|r| !hidden.is_hidden(&r.object_id))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(ReconcileReport),
    /// A newer pass for the same owner started; this one's results were dropped.
    Superseded,
}

/// Hints that let verification skip the owner-wide scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyHint {
    pub object_id: Option<String>,
    pub content_address: Option<String>,
}

/// Outcome of a mint followed by verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintOutcome {
    pub mint: MintState,
    pub content_address: Option<String>,
    /// Present when the mint succeeded and verification ran.
    pub verification: Option<VerificationState>,
}

/// Generation stamps and latest completed report per owner.
#[derive(Default)]
struct PassTracker {
    generations: Mutex<HashMap<String, u64>>,
    latest: RwLock<HashMap<String, ReconcileReport>>,
}

impl PassTracker {
    fn begin(&self, owner: &str) -> u64 {
        let mut generations = self.generations.lock();
        let generation = generations.entry(owner.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, owner: &str, generation: u64) -> bool {
        self.generations.lock().get(owner).copied() == Some(generation)
    }

    /// Publish `report` if `generation` is still the newest pass for its owner.
    ///
    /// `on_commit` runs before publication while the generation lock is held.
    fn commit(&self, generation: u64, report: &ReconcileReport, on_commit: impl FnOnce()) -> bool {
        let generations = self.generations.lock();
        if generations.get(&report.owner).copied() != Some(generation) {
            return false;
        }
        on_commit();
        self.latest
            .write()
            .insert(report.owner.clone(), report.clone());
        true
    }

    fn latest(&self, owner: &str) -> Option<ReconcileReport> {
        self.latest.read().get(owner).cloned()
    }
}

pub struct ReconcileSession {
    descriptors: Vec<CredentialDescriptor>,
    locator: CredentialLocator,
    resolver: BlobResolver,
    hidden: Arc<HiddenSet>,
    /// Keyed by normalized owner address.
    states: Mutex<HashMap<String, Arc<CredentialStateMachine>>>,
    submitter: Option<Arc<dyn TransactionSubmitter>>,
    resolve_transactions: bool,
    passes: PassTracker,
}

impl ReconcileSession {
    pub fn new(
        descriptors: Vec<CredentialDescriptor>,
        locator: CredentialLocator,
        resolver: BlobResolver,
        hidden: Arc<HiddenSet>,
    ) -> Self {
        Self {
            descriptors,
            locator,
            resolver,
            hidden,
            states: Mutex::new(HashMap::new()),
            submitter: None,
            resolve_transactions: true,
            passes: PassTracker::default(),
        }
    }

    pub fn with_submitter(mut self, submitter: Arc<dyn TransactionSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Enable or disable the per-record transaction lookup (on by default).
    pub fn with_transaction_lookup(mut self, enabled: bool) -> Self {
        self.resolve_transactions = enabled;
        self
    }

    pub fn descriptors(&self) -> &[CredentialDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, id: &str) -> Option<&CredentialDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn hidden(&self) -> &HiddenSet {
        &self.hidden
    }

    pub fn resolver(&self) -> &BlobResolver {
        &self.resolver
    }

    /// Verification and mint state of one credential for `owner`.
    pub fn status(&self, owner: &str, descriptor_id: &str) -> CredentialStatus {
        self.states_for(&normalize_address(owner)).state(descriptor_id)
    }

    /// Report of the latest completed pass for `owner`.
    pub fn latest_report(&self, owner: &str) -> Option<ReconcileReport> {
        self.passes.latest(&normalize_address(owner))
    }

    fn states_for(&self, owner: &str) -> Arc<CredentialStateMachine> {
        self.states
            .lock()
            .entry(owner.to_string())
            .or_default()
            .clone()
    }

    /// Run one reconciliation pass for `owner`.
    pub async fn reconcile(&self, owner: &str) -> Result<PassOutcome, ReconcileError> {
        if owner.trim().is_empty() {
            return Ok(PassOutcome::Completed(ReconcileReport::default()));
        }
        let owner = normalize_address(owner);
        let generation = self.passes.begin(&owner);
        debug!(owner = %owner, generation, "reconciliation pass started");

        let located = match self.locator.list_owned_credentials(Some(&owner)).await {
            Ok(located) => located,
            Err(_) if !self.passes.is_current(&owner, generation) => {
                return Ok(PassOutcome::Superseded)
            }
            Err(e) => return Err(e.into()),
        };

        let mut failures = Vec::new();
        if located.truncated {
            warn!(owner = %owner, "owner listing was truncated, pass is partial");
            failures.push(ItemFailure {
                object_id: None,
                stage: FailureStage::Listing,
                message: "ledger listing stopped at the page limit; results are partial"
                    .to_string(),
            });
        }
        failures.extend(located.skipped.into_iter().map(|skipped| ItemFailure {
            object_id: skipped.object_id,
            stage: FailureStage::Decode,
            message: skipped.error.to_string(),
        }));

        let mut matched = match_credentials(&self.descriptors, &located.objects);
        if self.resolve_transactions && !matched.records.is_empty() {
            let lookup_failures =
                resolve_transaction_ids(self.locator.source().as_ref(), &mut matched.records).await;
            failures.extend(lookup_failures);
        }

        let report = ReconcileReport {
            owner: owner.clone(),
            records: matched.records,
            unmatched: matched.unmatched,
            failures,
        };
        let states = self.states_for(&owner);
        let committed = self.passes.commit(generation, &report, || {
            for record in &report.records {
                states.mark_verified(&record.descriptor_id, &record.object_id);
            }
        });
        if !committed {
            debug!(owner = %owner, generation, "discarding superseded pass");
            return Ok(PassOutcome::Superseded);
        }

        info!(
            owner = %owner,
            matched = report.records.len(),
            unmatched = report.unmatched.len(),
            failures = report.failures.len(),
            "reconciliation pass complete"
        );
        Ok(PassOutcome::Completed(report))
    }

    /// Verify one credential on the ledger.
    ///
    /// With a known object id the object is fetched directly; otherwise (or if
    /// it is gone) the owner's credentials are scanned and matched against this
    /// descriptor alone.
    pub async fn verify_credential(
        &self,
        owner: &str,
        descriptor_id: &str,
        hint: VerifyHint,
    ) -> Result<VerificationState, ReconcileError> {
        let descriptor = self
            .descriptor(descriptor_id)
            .cloned()
            .ok_or_else(|| ReconcileError::UnknownDescriptor(descriptor_id.to_string()))?;

        let owner = normalize_address(owner);
        let state = self
            .states_for(&owner)
            .verify(descriptor_id, || self.locate_for(&owner, descriptor, hint))
            .await;
        Ok(state)
    }

    async fn locate_for(
        &self,
        owner: &str,
        descriptor: CredentialDescriptor,
        hint: VerifyHint,
    ) -> Result<String, ReconcileError> {
        if let Some(object_id) = hint.object_id.as_deref() {
            match self.locator.get_credential(object_id).await {
                Ok(Some(object)) => {
                    if let Some(expected) = hint.content_address.as_deref() {
                        if object.content_address.as_deref() != Some(expected) {
                            warn!(
                                object_id = %object.object_id,
                                expected,
                                actual = object.content_address.as_deref().unwrap_or(""),
                                "verified object has a different content address"
                            );
                        }
                    }
                    return Ok(object.object_id);
                }
                Ok(None) => debug!(object_id, "known object not found, scanning owner"),
                Err(e) => warn!(object_id, error = %e, "direct lookup failed, scanning owner"),
            }
        }

        let located = self.locator.list_owned_credentials(Some(owner)).await?;
        let matched = match_credentials(std::slice::from_ref(&descriptor), &located.objects);
        matched
            .records
            .into_iter()
            .next()
            .map(|record| record.object_id)
            .ok_or_else(|| ReconcileError::NotOnLedger {
                descriptor_id: descriptor.id.clone(),
                owner: owner.to_string(),
            })
    }

    /// Upload a file, submit the issue call, then verify the new credential.
    pub async fn mint_credential(
        &self,
        owner: &str,
        descriptor_id: &str,
        file: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<MintOutcome, ReconcileError> {
        let submitter = self.submitter.clone().ok_or(ReconcileError::NoSubmitter)?;
        let descriptor = self
            .descriptor(descriptor_id)
            .cloned()
            .ok_or_else(|| ReconcileError::UnknownDescriptor(descriptor_id.to_string()))?;
        let owner = normalize_address(owner);
        let uploaded: Mutex<Option<String>> = Mutex::new(None);

        let mint = self
            .states_for(&owner)
            .mint(descriptor_id, || async {
                let content_address = self.resolver.walrus().upload(file, content_type).await?;
                *uploaded.lock() = Some(content_address.clone());

                let call = IssueCredentialCall {
                    owner: owner.clone(),
                    title: descriptor.title.clone(),
                    issuer: descriptor.issuer.clone(),
                    score: DEFAULT_SCORE,
                    content_address,
                    timestamp_ms: u64::try_from(chrono::Utc::now().timestamp_millis())
                        .unwrap_or_default(),
                };
                submitter
                    .submit_issue_credential(&call)
                    .await
                    .map_err(|e| ReconcileError::Submit(e.to_string()))
            })
            .await;

        let content_address = uploaded.into_inner();
        let verification = match &mint {
            MintState::Minted { transaction_id } => {
                info!(credential = descriptor_id, transaction_id = %transaction_id, "credential minted");
                let hint = VerifyHint {
                    object_id: None,
                    content_address: content_address.clone(),
                };
                Some(self.verify_credential(&owner, descriptor_id, hint).await?)
            }
            _ => None,
        };

        Ok(MintOutcome {
            mint,
            content_address,
            verification,
        })
    }

    /// The file behind a verified record, cache first.
    pub async fn credential_file(
        &self,
        record: &VerifiedCredentialRecord,
    ) -> Result<ResolvedBlob, ReconcileError> {
        if !record.has_file() {
            return Err(ReconcileError::NoContentAddress {
                object_id: record.object_id.clone(),
            });
        }
        self.resolver.resolve(&record.content_address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(owner: &str, object_id: &str) -> ReconcileReport {
        ReconcileReport {
            owner: owner.to_string(),
            unmatched: vec![LedgerCredentialObject {
                object_id: object_id.to_string(),
                title: None,
                issuer: None,
                content_address: None,
                issue_timestamp: None,
                owner_address: owner.to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_stale_commit_does_not_replace_newer_report() {
        let passes = PassTracker::default();
        let older = passes.begin("0xa");
        let newer = passes.begin("0xa");

        assert!(passes.commit(newer, &report("0xa", "0x2"), || {}));
        let mut ran = false;
        assert!(!passes.commit(older, &report("0xa", "0x1"), || ran = true));
        assert!(!ran);
        assert_eq!(passes.latest("0xa"), Some(report("0xa", "0x2")));
    }

    #[test]
    fn test_generations_are_per_owner() {
        let passes = PassTracker::default();
        let a = passes.begin("0xa");
        let b = passes.begin("0xb");
        assert!(passes.is_current("0xa", a));
        assert!(passes.commit(b, &report("0xb", "0x1"), || {}));
        assert!(passes.commit(a, &report("0xa", "0x2"), || {}));
        assert!(passes.latest("0xc").is_none());
    }
}
