//! PostgreSQL Audit Ledger
//!
//! Implements `AuditLedgerPort` on the `audit_entries` table. Entries are
//! never updated beyond their commit state, and `query` streams rows straight
//! from the cursor rather than buffering the whole trail.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{debug, instrument};

use core_kernel::{
    AuditEntryId, ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};
use domain_claims::{
    AuditAction, AuditEntry, AuditLedgerPort, CommitState, Compensation, NewAuditEntry,
};

use crate::repositories::audit::{AuditEntryRow, AuditRepository, NewAuditEntryRow};

/// PostgreSQL-backed audit ledger
#[derive(Debug, Clone)]
pub struct PostgresAuditLedger {
    repository: AuditRepository,
    pool: PgPool,
}

impl PostgresAuditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: AuditRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresAuditLedger {}

#[async_trait]
impl HealthCheckable for PostgresAuditLedger {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-audit-ledger").await
    }
}

#[async_trait]
impl AuditLedgerPort for PostgresAuditLedger {
    #[instrument(skip(self, entry, state), fields(action = %entry.action, state = state.as_str()))]
    async fn append(&self, entry: NewAuditEntry, state: CommitState) -> Result<AuditEntry, PortError> {
        let row = self.repository.append(&entry_to_row(&entry, state)?).await?;
        debug!(sequence = row.sequence, "Audit entry appended");
        row_to_entry(row)
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn mark_committed(&self, id: AuditEntryId) -> Result<(), PortError> {
        self.repository
            .advance_state(*id.as_uuid(), CommitState::Committed.as_str())
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn mark_discarded(&self, id: AuditEntryId) -> Result<(), PortError> {
        self.repository
            .advance_state(*id.as_uuid(), CommitState::Discarded.as_str())
            .await?;
        Ok(())
    }

    fn query<'a>(&'a self, claim_id: &'a ClaimId) -> BoxStream<'a, Result<AuditEntry, PortError>> {
        self.repository
            .stream_committed(claim_id.as_str())
            .map(|row| row.map_err(PortError::from).and_then(row_to_entry))
            .boxed()
    }

    async fn pending(&self) -> Result<Vec<AuditEntry>, PortError> {
        self.repository
            .find_pending()
            .await?
            .into_iter()
            .map(row_to_entry)
            .collect()
    }

    async fn find_committed_by_key(&self, key: &str) -> Result<Option<AuditEntry>, PortError> {
        self.repository
            .find_committed_by_key(key)
            .await?
            .map(row_to_entry)
            .transpose()
    }
}

fn entry_to_row(entry: &NewAuditEntry, state: CommitState) -> Result<NewAuditEntryRow, PortError> {
    let compensation = entry
        .compensation
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| PortError::transformation(format!("compensation: {}", e)))?;

    Ok(NewAuditEntryRow {
        entry_id: *AuditEntryId::new_v7().as_uuid(),
        claim_id: entry.claim_id.as_ref().map(ToString::to_string),
        action: entry.action.as_str().to_string(),
        actor: entry.actor.clone(),
        description: entry.description.clone(),
        details: Value::Object(entry.details.clone()),
        idempotency_key: entry.idempotency_key.clone(),
        state: state.as_str().to_string(),
        compensation,
    })
}

fn row_to_entry(row: AuditEntryRow) -> Result<AuditEntry, PortError> {
    let transform = |e: core_kernel::CoreError| PortError::transformation(e.to_string());

    let details = match row.details {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(PortError::transformation(format!(
                "audit details must be an object, found {other}"
            )))
        }
    };
    let compensation = row
        .compensation
        .map(serde_json::from_value::<Compensation>)
        .transpose()
        .map_err(|e| PortError::transformation(format!("compensation: {}", e)))?;

    Ok(AuditEntry {
        id: AuditEntryId::from_uuid(row.entry_id),
        sequence: row.sequence,
        claim_id: row.claim_id.map(ClaimId::parse).transpose().map_err(transform)?,
        action: AuditAction::from_tag(&row.action),
        actor: row.actor,
        description: row.description,
        details,
        timestamp: row.recorded_at,
        idempotency_key: row.idempotency_key,
        state: CommitState::from_str(&row.state).map_err(transform)?,
        compensation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain_claims::{Claim, ClaimStatus};

    fn stored(entry: &NewAuditEntry, state: CommitState) -> AuditEntryRow {
        let row = entry_to_row(entry, state).unwrap();
        AuditEntryRow {
            entry_id: row.entry_id,
            sequence: 7,
            claim_id: row.claim_id,
            action: row.action,
            actor: row.actor,
            description: row.description,
            details: row.details,
            recorded_at: Utc::now(),
            idempotency_key: row.idempotency_key,
            state: row.state,
            compensation: row.compensation,
        }
    }

    #[test]
    fn test_pending_entry_keeps_compensation() {
        let prior = Claim::with_status(ClaimId::parse("C1").unwrap(), ClaimStatus::Approved);
        let entry = NewAuditEntry::new(AuditAction::PaymentConfirmed, "webhook:payment", "Payment confirmed")
            .for_claim(Some(prior.id.clone()))
            .with_detail("paymentId", "P1")
            .with_compensation(Compensation::Claim { prior: Box::new(prior) });

        let loaded = row_to_entry(stored(&entry, CommitState::Pending)).unwrap();

        assert_eq!(loaded.state, CommitState::Pending);
        assert_eq!(loaded.sequence, 7);
        assert_eq!(loaded.detail_str("paymentId"), Some("P1"));
        assert_eq!(loaded.compensation, entry.compensation);
    }

    #[test]
    fn test_unrecognized_action_survives_loading() {
        let entry = NewAuditEntry::new(AuditAction::from_tag("LEGACY_IMPORT"), "system", "Imported");
        let loaded = row_to_entry(stored(&entry, CommitState::Committed)).unwrap();
        assert_eq!(loaded.action.as_str(), "LEGACY_IMPORT");
        assert!(loaded.claim_id.is_none());
    }

    #[test]
    fn test_non_object_details_are_rejected() {
        let entry = NewAuditEntry::new(AuditAction::WebhookReceived, "webhook:fraud", "Received");
        let mut row = stored(&entry, CommitState::Committed);
        row.details = Value::from(3);
        assert!(matches!(row_to_entry(row), Err(PortError::Transformation { .. })));
    }
}
