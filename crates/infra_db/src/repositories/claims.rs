//! Claims repository implementation
//!
//! Row-level access to the `claims` table. Every update is guarded by the
//! row version and bumps it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

const CLAIM_COLUMNS: &str = r#"
    claim_id, lifecycle_status, fraud_flagged, fraud_score, fraud_indicators,
    payment_id, payment_amount, paid_at, version, last_entry_id, created_at, updated_at
"#;

/// Repository for the claim state store
#[derive(Debug, Clone)]
pub struct ClaimsRepository {
    pool: PgPool,
}

/// A row of the `claims` table
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ClaimRow {
    pub claim_id: String,
    pub lifecycle_status: String,
    pub fraud_flagged: bool,
    pub fraud_score: Option<f64>,
    pub fraud_indicators: Vec<String>,
    pub payment_id: Option<String>,
    pub payment_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub last_entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClaimsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Retrieves a claim by its identifier
    pub async fn find_by_id(&self, claim_id: &str) -> Result<Option<ClaimRow>, DatabaseError> {
        let sql = format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = $1");
        let row = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(claim_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Inserts a claim at version 1
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the id is taken
    pub async fn insert(&self, claim: &ClaimRow) -> Result<ClaimRow, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO claims (
                claim_id, lifecycle_status, fraud_flagged, fraud_score, fraud_indicators,
                payment_id, payment_amount, paid_at, version, last_entry_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, $10, $11)
            RETURNING {CLAIM_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(&claim.claim_id)
            .bind(&claim.lifecycle_status)
            .bind(claim.fraud_flagged)
            .bind(claim.fraud_score)
            .bind(&claim.fraud_indicators)
            .bind(&claim.payment_id)
            .bind(claim.payment_amount)
            .bind(claim.paid_at)
            .bind(claim.last_entry_id)
            .bind(claim.created_at)
            .bind(claim.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Replaces a claim if it is still at `expected_version`
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NotFound` if the claim does not exist
    /// - `DatabaseError::VersionConflict` if the stored version differs
    pub async fn update(&self, claim: &ClaimRow, expected_version: i64) -> Result<ClaimRow, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE claims SET
                lifecycle_status = $2,
                fraud_flagged = $3,
                fraud_score = $4,
                fraud_indicators = $5,
                payment_id = $6,
                payment_amount = $7,
                paid_at = $8,
                updated_at = $9,
                last_entry_id = $10,
                version = version + 1
            WHERE claim_id = $1 AND version = $11
            RETURNING {CLAIM_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, ClaimRow>(&sql)
            .bind(&claim.claim_id)
            .bind(&claim.lifecycle_status)
            .bind(claim.fraud_flagged)
            .bind(claim.fraud_score)
            .bind(&claim.fraud_indicators)
            .bind(&claim.payment_id)
            .bind(claim.payment_amount)
            .bind(claim.paid_at)
            .bind(claim.updated_at)
            .bind(claim.last_entry_id)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(row) => Ok(row),
            None => match self.find_by_id(&claim.claim_id).await? {
                Some(_) => Err(DatabaseError::version_conflict("Claim", &claim.claim_id, expected_version)),
                None => Err(DatabaseError::not_found("Claim", &claim.claim_id)),
            },
        }
    }
}
