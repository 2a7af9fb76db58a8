//! PostgreSQL adapter tests
//!
//! Each test starts its own container; run with `cargo test -- --ignored`
//! on a host with Docker.

use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;

use core_kernel::PortError;
use domain_claims::{
    AuditAction, AuditLedgerPort, ClaimPort, ClaimStatus, CommitState, NewAuditEntry,
    SignatureVerifier, WebhookService,
};
use infra_db::{PostgresAuditLedger, PostgresClaimAdapter, PostgresDocumentAdapter};
use test_utils::{
    assert_chronological, create_isolated_test_database, ClaimFixtures, IdFixtures,
    WebhookEventBuilder, WEBHOOK_SECRET,
};

fn entry(claim: &str, action: AuditAction) -> NewAuditEntry {
    NewAuditEntry::new(action, "webhook:test", "test entry").for_claim(Some(IdFixtures::claim(claim)))
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_claim_update_is_version_guarded() {
    let db = create_isolated_test_database().await.unwrap();
    let claims = PostgresClaimAdapter::new(db.pool().clone());

    let stored = claims.insert_claim(ClaimFixtures::approved("C1")).await.unwrap();
    assert_eq!(stored.version, 1);

    let mut paid = stored.clone();
    paid.lifecycle_status = ClaimStatus::Paid;
    let updated = claims.update_claim(paid.clone(), 1).await.unwrap();
    assert_eq!(updated.version, 2);

    let stale = claims.update_claim(paid, 1).await.unwrap_err();
    assert!(stale.is_conflict());

    let missing = claims
        .update_claim(ClaimFixtures::approved("C404"), 1)
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_ledger_commit_protocol() {
    let db = create_isolated_test_database().await.unwrap();
    let ledger = PostgresAuditLedger::new(db.pool().clone());
    let claim_id = IdFixtures::claim("C1");

    let first = ledger
        .append(entry("C1", AuditAction::PaymentConfirmed).with_idempotency_key("k1"), CommitState::Pending)
        .await
        .unwrap();
    assert_eq!(ledger.pending().await.unwrap().len(), 1);
    assert!(ledger.query(&claim_id).try_collect::<Vec<_>>().await.unwrap().is_empty());

    ledger.mark_committed(first.id).await.unwrap();
    assert!(ledger.find_committed_by_key("k1").await.unwrap().is_some());

    // Entries leave pending exactly once
    let again = ledger.mark_discarded(first.id).await.unwrap_err();
    assert!(again.is_conflict());

    // A second commit under the same key violates the unique index
    let second = ledger
        .append(entry("C1", AuditAction::PaymentConfirmed).with_idempotency_key("k1"), CommitState::Pending)
        .await
        .unwrap();
    let duplicate = ledger.mark_committed(second.id).await.unwrap_err();
    assert!(matches!(duplicate, PortError::Conflict { .. }));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_trail_is_chronological() {
    let db = create_isolated_test_database().await.unwrap();
    let ledger = PostgresAuditLedger::new(db.pool().clone());

    for action in [AuditAction::WebhookReceived, AuditAction::FraudScoreUpdated, AuditAction::ClaimNote] {
        ledger.append(entry("C1", action), CommitState::Committed).await.unwrap();
    }

    let trail: Vec<_> = ledger
        .query(&IdFixtures::claim("C1"))
        .try_collect()
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);
    assert_chronological(&trail);
    assert!(trail.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_appends_for_different_claims_interleave() {
    let db = create_isolated_test_database().await.unwrap();
    let ledger = Arc::new(PostgresAuditLedger::new(db.pool().clone()));

    let mut handles = Vec::new();
    for i in 0..20 {
        let ledger = ledger.clone();
        let claim = if i % 2 == 0 { "C1" } else { "C2" };
        handles.push(tokio::spawn(async move {
            ledger.append(entry(claim, AuditAction::ClaimNote), CommitState::Committed).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for claim in ["C1", "C2"] {
        let trail: Vec<_> = ledger
            .query(&IdFixtures::claim(claim))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(trail.len(), 10);
        assert!(trail.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_committed_rows_are_immutable() {
    let db = create_isolated_test_database().await.unwrap();
    let ledger = PostgresAuditLedger::new(db.pool().clone());
    ledger
        .append(entry("C1", AuditAction::ClaimNote), CommitState::Committed)
        .await
        .unwrap();

    let update = sqlx::query("UPDATE audit_entries SET description = 'edited'")
        .execute(db.pool())
        .await;
    assert!(update.is_err());

    let delete = sqlx::query("DELETE FROM audit_entries").execute(db.pool()).await;
    assert!(delete.is_err());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_webhook_service_on_postgres() {
    let db = create_isolated_test_database().await.unwrap();
    let pool = db.pool().clone();
    let claims = Arc::new(PostgresClaimAdapter::new(pool.clone()));
    claims.insert_claim(ClaimFixtures::approved("C1")).await.unwrap();

    let service = WebhookService::new(
        SignatureVerifier::new(WEBHOOK_SECRET),
        claims.clone(),
        Arc::new(PostgresDocumentAdapter::new(pool.clone())),
        Arc::new(PostgresAuditLedger::new(pool)),
    );

    let webhook = WebhookEventBuilder::payment("C1", "P1", json!(4200.50))
        .with_id("evt-1")
        .signed("payment-gateway");
    service.handle(webhook.inbound()).await.unwrap();
    let redelivery = service.handle(webhook.inbound()).await.unwrap();
    assert_eq!(redelivery.action.as_str(), "duplicate_skipped");

    let claim = claims.get_claim(&IdFixtures::claim("C1")).await.unwrap().unwrap();
    assert_eq!(claim.status(), ClaimStatus::Paid);
    assert_eq!(claim.version, 2);

    let trail = service.audit_trail(&IdFixtures::claim("C1")).await.unwrap();
    let payment = trail
        .iter()
        .find(|e| e.action == AuditAction::PaymentConfirmed)
        .unwrap();
    assert_eq!(payment.details["amount"], json!(4200.5));
    assert_eq!(claim.last_entry_id, Some(payment.id));

    let report = service.recover().await.unwrap();
    assert_eq!(report.examined, 0);
}
