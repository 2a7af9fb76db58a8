//! PostgreSQL Claim Adapter
//!
//! Implements `ClaimPort` on the `claims` table via [`ClaimsRepository`].

use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::{debug, instrument};

use core_kernel::{AuditEntryId, ClaimId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_claims::{Claim, ClaimPort, ClaimStatus};

use crate::repositories::claims::{ClaimRow, ClaimsRepository};

/// PostgreSQL-backed implementation of `ClaimPort`
#[derive(Debug, Clone)]
pub struct PostgresClaimAdapter {
    repository: ClaimsRepository,
    pool: PgPool,
}

impl PostgresClaimAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ClaimsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Returns the underlying repository
    pub fn repository(&self) -> &ClaimsRepository {
        &self.repository
    }
}

impl DomainPort for PostgresClaimAdapter {}

#[async_trait]
impl HealthCheckable for PostgresClaimAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-claim-adapter").await
    }
}

#[async_trait]
impl ClaimPort for PostgresClaimAdapter {
    #[instrument(skip(self), fields(claim_id = %id))]
    async fn get_claim(&self, id: &ClaimId) -> Result<Option<Claim>, PortError> {
        self.repository
            .find_by_id(id.as_str())
            .await?
            .map(row_to_claim)
            .transpose()
    }

    #[instrument(skip(self, claim), fields(claim_id = %claim.id))]
    async fn insert_claim(&self, claim: Claim) -> Result<Claim, PortError> {
        let row = self.repository.insert(&claim_to_row(&claim)).await?;
        debug!("Claim inserted");
        row_to_claim(row)
    }

    #[instrument(skip(self, claim), fields(claim_id = %claim.id))]
    async fn update_claim(&self, claim: Claim, expected_version: i64) -> Result<Claim, PortError> {
        let row = self
            .repository
            .update(&claim_to_row(&claim), expected_version)
            .await?;
        debug!(version = row.version, "Claim updated");
        row_to_claim(row)
    }
}

pub(crate) fn claim_to_row(claim: &Claim) -> ClaimRow {
    ClaimRow {
        claim_id: claim.id.to_string(),
        lifecycle_status: claim.lifecycle_status.as_str().to_string(),
        fraud_flagged: claim.fraud_flagged,
        fraud_score: claim.fraud_score,
        fraud_indicators: claim.fraud_indicators.clone(),
        payment_id: claim.payment_id.clone(),
        payment_amount: claim.payment_amount,
        paid_at: claim.paid_at,
        version: claim.version,
        last_entry_id: claim.last_entry_id.map(|id| *id.as_uuid()),
        created_at: claim.created_at,
        updated_at: claim.updated_at,
    }
}

pub(crate) fn row_to_claim(row: ClaimRow) -> Result<Claim, PortError> {
    let id = ClaimId::parse(&row.claim_id).map_err(|e| PortError::transformation(e.to_string()))?;
    let lifecycle_status = ClaimStatus::from_str(&row.lifecycle_status)
        .map_err(|e| PortError::transformation(e.to_string()))?;

    Ok(Claim {
        id,
        lifecycle_status,
        fraud_flagged: row.fraud_flagged,
        fraud_score: row.fraud_score,
        fraud_indicators: row.fraud_indicators,
        payment_id: row.payment_id,
        payment_amount: row.payment_amount,
        paid_at: row.paid_at,
        version: row.version,
        last_entry_id: row.last_entry_id.map(AuditEntryId::from_uuid),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_mapping_round_trip() {
        let mut claim = Claim::with_status(ClaimId::parse("C1").unwrap(), ClaimStatus::Approved);
        claim.record_payment("P1", dec!(4200), Utc::now()).unwrap();
        claim.version = 4;
        claim.last_entry_id = Some(AuditEntryId::new_v7());

        assert_eq!(row_to_claim(claim_to_row(&claim)).unwrap(), claim);
    }

    #[test]
    fn test_unknown_status_is_transformation_error() {
        let mut row = claim_to_row(&Claim::submitted(ClaimId::parse("C1").unwrap()));
        row.lifecycle_status = "ARCHIVED".to_string();
        assert!(matches!(row_to_claim(row), Err(PortError::Transformation { .. })));
    }
}
