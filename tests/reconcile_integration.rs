//! End-to-end reconciliation passes over in-memory ledger and Walrus doubles.

mod common;

use std::sync::Arc;

use common::*;
use serde_json::json;
use vitae_cache::BlobCache;
use vitae_reconcile::{
    FailureStage, MintState, PassOutcome, ReconcileError, ReconcileReport, VerificationState,
    VerifyHint,
};
use vitae_types::{CredentialDescriptor, MatchTier};

fn catalog() -> Vec<CredentialDescriptor> {
    vec![
        CredentialDescriptor::new("1", "Professional Web Developer", "Frontend Institute"),
        CredentialDescriptor::new("3", "Git Expert", "CertHub Academy"),
        CredentialDescriptor::new("5", "Cloud Architecture Fundamentals", "SkyCert"),
    ]
}

async fn completed(
    session: &vitae_reconcile::ReconcileSession,
    owner: &str,
) -> ReconcileReport {
    match session.reconcile(owner).await.unwrap() {
        PassOutcome::Completed(report) => report,
        PassOutcome::Superseded => panic!("pass unexpectedly superseded"),
    }
}

#[tokio::test]
async fn test_exact_match_carries_content_address() {
    let h = Harness::new();
    let owner = addr(0xa11ce);
    let object_id = addr(1);
    h.ledger.add(
        &owner,
        raw_credential(
            &object_id,
            &owner,
            json!({ "course_name": "Git Expert", "issuer_name": "CertHub Academy", "blob_id": "abc123" }),
        ),
    );
    h.ledger.set_creating_transaction(&object_id, "DigestGit");

    let session = h.session(catalog());
    let report = completed(&session, &owner).await;

    let record = report.record_for("3").expect("git expert matched");
    assert_eq!(record.content_address, "abc123");
    assert_eq!(record.tier, MatchTier::Exact);
    assert_eq!(record.object_id, object_id);
    assert_eq!(record.owner_address, owner);
    assert_eq!(record.transaction_id.as_deref(), Some("DigestGit"));
    assert!(report.failures.is_empty());
    assert_eq!(
        session.status(&owner, "3").verification,
        VerificationState::Verified { object_id }
    );
}

#[tokio::test]
async fn test_title_match_survives_formatting_differences() {
    let h = Harness::new();
    let owner = addr(0xb0b);
    let object_id = addr(2);
    h.ledger.add(
        &owner,
        raw_credential(
            &object_id,
            &owner,
            json!({ "title": "professional web developer ", "blobId": "web-blob" }),
        ),
    );

    let session = h.session(catalog()).with_transaction_lookup(false);
    let report = completed(&session, &owner).await;

    let record = report.record_for("1").expect("web developer matched");
    assert_eq!(record.tier, MatchTier::TitleOnly);
    assert_eq!(record.content_address, "web-blob");
    assert_eq!(record.transaction_id, None);
    assert!(report.unmatched.is_empty());
}

#[tokio::test]
async fn test_undecodable_and_unmatched_objects_are_reported() {
    let h = Harness::new();
    let owner = addr(0xc0);
    h.ledger.add(
        &owner,
        raw_credential(&addr(3), &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );
    h.ledger.add(
        &owner,
        raw_credential(&addr(4), &owner, json!({ "title": ["not", "a", "string"] })),
    );
    h.ledger.add(
        &owner,
        raw_credential(&addr(5), &owner, json!({ "title": "Underwater Basket Weaving" })),
    );

    let session = h.session(catalog());
    let report = completed(&session, &owner).await;

    assert_eq!(report.records.len(), 1);
    assert!(!report.records[0].has_file());
    assert_eq!(report.unmatched.len(), 1);
    assert_eq!(report.unmatched[0].object_id, addr(5));

    let decode: Vec<_> = report
        .failures
        .iter()
        .filter(|f| f.stage == FailureStage::Decode)
        .collect();
    assert_eq!(decode.len(), 1);
    assert_eq!(decode[0].object_id.as_deref(), Some(addr(4).as_str()));

    // No creating transaction registered for the match.
    assert!(report
        .failures
        .iter()
        .any(|f| f.stage == FailureStage::TransactionLookup));
}

#[tokio::test]
async fn test_truncated_listing_is_reported_as_partial() {
    let h = Harness::new();
    let owner = addr(0xc1);
    h.ledger.add(
        &owner,
        raw_credential(&addr(12), &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );
    h.ledger.truncate_listings();

    let session = h.session(catalog()).with_transaction_lookup(false);
    let report = completed(&session, &owner).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, FailureStage::Listing);
    assert_eq!(report.failures[0].object_id, None);
}

#[tokio::test]
async fn test_blank_owner_yields_empty_report() {
    let h = Harness::new();
    let session = h.session(catalog());
    let report = completed(&session, "  ").await;
    assert!(report.records.is_empty());
    assert_eq!(h.ledger.owned_calls(), 0);
}

#[tokio::test]
async fn test_stale_pass_is_superseded() {
    let h = Harness::new();
    let owner = addr(0xd0);
    h.ledger.add(
        &owner,
        raw_credential(&addr(6), &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );
    let gate = h.ledger.park_first_listing();
    let session = h.session(catalog()).with_transaction_lookup(false);

    let first = session.reconcile(&owner);
    let second = async {
        let outcome = session.reconcile(&owner).await;
        gate.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), PassOutcome::Superseded);
    match second.unwrap() {
        PassOutcome::Completed(report) => assert_eq!(report.records.len(), 1),
        PassOutcome::Superseded => panic!("newest pass must complete"),
    }
    assert_eq!(session.latest_report(&owner).unwrap().records.len(), 1);
}

#[tokio::test]
async fn test_hidden_records_are_filtered_from_view() {
    let h = Harness::new();
    let owner = addr(0xe0);
    h.ledger.add(
        &owner,
        raw_credential(&addr(7), &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );
    h.ledger.add(
        &owner,
        raw_credential(&addr(8), &owner, json!({ "title": "Cloud Architecture Fundamentals" })),
    );
    h.hidden.hide(&addr(7)).unwrap();

    let session = h.session(catalog()).with_transaction_lookup(false);
    let report = completed(&session, &owner).await;

    assert_eq!(report.records.len(), 2);
    let visible = report.visible(session.hidden());
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].descriptor_id, "5");

    // Hiding persists across sessions sharing the store.
    let reloaded = vitae_cache::HiddenSet::load(h.store.clone()).unwrap();
    assert!(reloaded.is_hidden(&addr(7)));
}

#[tokio::test]
async fn test_verify_uses_known_object_id() {
    let h = Harness::new();
    let owner = addr(0xf0);
    let object_id = addr(9);
    h.ledger.add(
        &owner,
        raw_credential(&object_id, &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );

    let session = h.session(catalog());
    let hint = VerifyHint {
        object_id: Some(object_id.clone()),
        content_address: None,
    };
    let state = session.verify_credential(&owner, "3", hint).await.unwrap();

    assert_eq!(state, VerificationState::Verified { object_id });
    assert_eq!(h.ledger.object_calls(), 1);
    assert_eq!(h.ledger.owned_calls(), 0);
}

#[tokio::test]
async fn test_verify_falls_back_to_owner_scan() {
    let h = Harness::new();
    let owner = addr(0xf1);
    let object_id = addr(10);
    h.ledger.add(
        &owner,
        raw_credential(&object_id, &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );

    let session = h.session(catalog());
    let hint = VerifyHint {
        object_id: Some(addr(0xdead)),
        content_address: None,
    };
    let state = session.verify_credential(&owner, "3", hint).await.unwrap();

    assert_eq!(state, VerificationState::Verified { object_id });
    assert_eq!(h.ledger.owned_calls(), 1);
}

#[tokio::test]
async fn test_verify_without_credential_fails_and_can_retry() {
    let h = Harness::new();
    let owner = addr(0xf2);
    let session = h.session(catalog());

    let state = session
        .verify_credential(&owner, "3", VerifyHint::default())
        .await
        .unwrap();
    assert!(matches!(state, VerificationState::Failed { .. }));

    h.ledger.add(
        &owner,
        raw_credential(&addr(11), &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );
    let state = session
        .verify_credential(&owner, "3", VerifyHint::default())
        .await
        .unwrap();
    assert!(state.is_verified());
}

#[tokio::test]
async fn test_verified_state_is_per_owner() {
    let h = Harness::new();
    let alice = addr(0xa1);
    let bob = addr(0xb1);
    let object_id = addr(13);
    h.ledger.add(
        &alice,
        raw_credential(&object_id, &alice, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );

    let session = h.session(catalog()).with_transaction_lookup(false);
    completed(&session, &alice).await;
    assert!(session.status(&alice, "3").verification.is_verified());
    assert_eq!(session.status(&bob, "3").verification, VerificationState::Unverified);

    let listings_before = h.ledger.owned_calls();
    let state = session
        .verify_credential(&bob, "3", VerifyHint::default())
        .await
        .unwrap();
    assert!(matches!(state, VerificationState::Failed { .. }));
    assert_eq!(h.ledger.owned_calls(), listings_before + 1);

    // Alice's state is untouched by Bob's failed verification.
    assert_eq!(
        session.status(&alice, "3").verification,
        VerificationState::Verified { object_id }
    );
}

#[tokio::test]
async fn test_verify_unknown_descriptor() {
    let h = Harness::new();
    let session = h.session(catalog());
    let err = session
        .verify_credential(&addr(1), "missing", VerifyHint::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::UnknownDescriptor(id) if id == "missing"));
}

#[tokio::test]
async fn test_mint_uploads_submits_and_verifies() {
    let h = Harness::new();
    let owner = addr(0x5a);
    let submitter = Arc::new(LedgerSubmitter::new(h.ledger.clone()));
    let session = h.session(catalog()).with_submitter(submitter.clone());

    let outcome = session
        .mint_credential(&owner, "3", b"%PDF-1.7 certificate".to_vec(), Some("application/pdf"))
        .await
        .unwrap();

    assert_eq!(
        outcome.mint,
        MintState::Minted {
            transaction_id: "Digest1".to_string()
        }
    );
    let content_address = outcome.content_address.expect("uploaded");
    assert!(outcome.verification.unwrap().is_verified());

    let calls = submitter.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].owner, owner);
    assert_eq!(calls[0].title, "Git Expert");
    assert_eq!(calls[0].issuer, "CertHub Academy");
    assert_eq!(calls[0].score, 100);
    assert_eq!(calls[0].content_address, content_address);

    // The following pass sees the minted object and its file.
    let report = completed(&session, &owner).await;
    let record = report.record_for("3").unwrap();
    assert_eq!(record.content_address, content_address);
    assert_eq!(record.transaction_id.as_deref(), Some("Digest1"));

    let file = session.credential_file(record).await.unwrap();
    assert_eq!(file.bytes, b"%PDF-1.7 certificate");
    assert_eq!(file.content_type, "application/pdf");
}

#[tokio::test]
async fn test_mint_rejected_by_submitter() {
    let h = Harness::new();
    let mut submitter = LedgerSubmitter::new(h.ledger.clone());
    submitter.reject = true;
    let session = h.session(catalog()).with_submitter(Arc::new(submitter));

    let outcome = session
        .mint_credential(&addr(0x5b), "3", b"file".to_vec(), None)
        .await
        .unwrap();

    assert!(matches!(outcome.mint, MintState::MintFailed { ref reason } if reason.contains("rejected")));
    assert!(outcome.content_address.is_some());
    assert!(outcome.verification.is_none());
}

#[tokio::test]
async fn test_mint_without_submitter() {
    let h = Harness::new();
    let session = h.session(catalog());
    let err = session
        .mint_credential(&addr(0x5c), "3", b"file".to_vec(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::NoSubmitter));
}

#[tokio::test]
async fn test_upload_fails_over_to_next_publisher() {
    let h = Harness::new();
    h.walrus.take_down(PUBLISHER_A);
    let walrus = h.walrus_client();

    let blob_id = walrus.upload(b"hello".to_vec(), Some("text/plain")).await.unwrap();

    assert_eq!(blob_id, "blob-1");
    let puts = h.walrus.put_urls();
    assert_eq!(puts.len(), 2);
    assert!(puts[0].starts_with(PUBLISHER_A));
    assert!(puts[1].starts_with(PUBLISHER_B));
}

#[tokio::test]
async fn test_upload_reports_every_publisher_failure() {
    let h = Harness::new();
    h.walrus.take_down(PUBLISHER_A);
    h.walrus.take_down(PUBLISHER_B);

    let err = h
        .walrus_client()
        .upload(b"hello".to_vec(), None)
        .await
        .unwrap_err();

    assert_eq!(err.attempts.len(), 2);
    let message = err.to_string();
    assert!(message.contains(PUBLISHER_A));
    assert!(message.contains(PUBLISHER_B));
}

#[tokio::test]
async fn test_credential_file_is_served_from_cache_after_first_fetch() {
    let h = Harness::new();
    let owner = addr(0x77);
    let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0];
    h.walrus.store("png-blob", &png, "image/png");
    h.ledger.add(
        &owner,
        raw_credential(
            &addr(12),
            &owner,
            json!({ "title": "Git Expert", "issuer": "CertHub Academy", "blob_id": "png-blob" }),
        ),
    );

    let session = h.session(catalog()).with_transaction_lookup(false);
    let report = completed(&session, &owner).await;
    let record = report.record_for("3").unwrap();

    let first = session.credential_file(record).await.unwrap();
    let second = session.credential_file(record).await.unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(second.bytes, png);
    assert_eq!(h.walrus.gets(), 1);
    assert!(h.cache.has("png-blob"));

    let metrics = session.resolver().metrics().snapshot();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.misses, 1);
}

#[tokio::test]
async fn test_credential_file_requires_content_address() {
    let h = Harness::new();
    let owner = addr(0x78);
    h.ledger.add(
        &owner,
        raw_credential(&addr(13), &owner, json!({ "title": "Git Expert", "issuer": "CertHub Academy" })),
    );
    let session = h.session(catalog()).with_transaction_lookup(false);
    let report = completed(&session, &owner).await;

    let err = session
        .credential_file(report.record_for("3").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::NoContentAddress { .. }));
}
