//! Audit ledger repository implementation
//!
//! Rows are inserted once and only their `state` column moves afterwards,
//! and only out of `pending`. A trigger installed by the migrations enforces
//! the same rule at the database level.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

const ENTRY_COLUMNS: &str = r#"
    entry_id, sequence, claim_id, action, actor, description, details,
    recorded_at, idempotency_key, state, compensation
"#;

/// Advisory lock namespace for appends; the second key is the claim id hash
const APPEND_LOCK_SPACE: i32 = 0x4155_4454;

/// Stands in for the claim id of entries that name no claim
const SYSTEM_LOCK_SUBJECT: &str = "system";

/// Repository for the append-only audit ledger
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

/// A row of the `audit_entries` table
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AuditEntryRow {
    pub entry_id: Uuid,
    pub sequence: i64,
    pub claim_id: Option<String>,
    pub action: String,
    pub actor: String,
    pub description: String,
    pub details: Value,
    pub recorded_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub state: String,
    pub compensation: Option<Value>,
}

/// An entry to insert
#[derive(Debug, Clone)]
pub struct NewAuditEntryRow {
    pub entry_id: Uuid,
    pub claim_id: Option<String>,
    pub action: String,
    pub actor: String,
    pub description: String,
    pub details: Value,
    pub idempotency_key: Option<String>,
    pub state: String,
    pub compensation: Option<Value>,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends an entry
    ///
    /// Appends are serialized per claim, and entries naming no claim share
    /// one lock. The recorded timestamp is the later of the clock and one
    /// microsecond past the newest entry of the same claim.
    pub async fn append(&self, entry: &NewAuditEntryRow) -> Result<AuditEntryRow, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
            .bind(APPEND_LOCK_SPACE)
            .bind(entry.claim_id.as_deref().unwrap_or(SYSTEM_LOCK_SUBJECT))
            .execute(&mut *tx)
            .await?;

        let same_claim = match entry.claim_id {
            Some(_) => "claim_id = $2",
            None => "claim_id IS NULL",
        };
        let sql = format!(
            r#"
            INSERT INTO audit_entries (
                entry_id, claim_id, action, actor, description, details,
                recorded_at, idempotency_key, state, compensation
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                GREATEST(
                    clock_timestamp(),
                    COALESCE(
                        (SELECT MAX(recorded_at) FROM audit_entries WHERE {same_claim})
                            + INTERVAL '1 microsecond',
                        clock_timestamp()
                    )
                ),
                $7, $8, $9
            )
            RETURNING {ENTRY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AuditEntryRow>(&sql)
            .bind(entry.entry_id)
            .bind(&entry.claim_id)
            .bind(&entry.action)
            .bind(&entry.actor)
            .bind(&entry.description)
            .bind(&entry.details)
            .bind(&entry.idempotency_key)
            .bind(&entry.state)
            .bind(&entry.compensation)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Moves a pending entry to `state`
    ///
    /// # Errors
    ///
    /// - `DatabaseError::NotFound` if no such entry exists
    /// - `DatabaseError::VersionConflict` if the entry is no longer pending
    /// - `DatabaseError::DuplicateEntry` if committing would repeat an
    ///   idempotency key
    pub async fn advance_state(&self, entry_id: Uuid, state: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE audit_entries SET state = $2 WHERE entry_id = $1 AND state = 'pending'",
        )
        .bind(entry_id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<String> =
            sqlx::query_scalar("SELECT state FROM audit_entries WHERE entry_id = $1")
                .bind(entry_id)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(current) => Err(DatabaseError::VersionConflict(format!(
                "audit entry {} is {}, not pending",
                entry_id, current
            ))),
            None => Err(DatabaseError::not_found("AuditEntry", entry_id)),
        }
    }

    /// Streams the committed entries of a claim, oldest first
    pub fn stream_committed<'a>(
        &'a self,
        claim_id: &'a str,
    ) -> BoxStream<'a, Result<AuditEntryRow, DatabaseError>> {
        sqlx::query_as::<_, AuditEntryRow>(
            r#"
            SELECT entry_id, sequence, claim_id, action, actor, description, details,
                   recorded_at, idempotency_key, state, compensation
            FROM audit_entries
            WHERE claim_id = $1 AND state = 'committed'
            ORDER BY recorded_at, sequence
            "#,
        )
        .bind(claim_id)
        .fetch(&self.pool)
        .map_err(DatabaseError::from)
        .boxed()
    }

    /// Lists pending entries in append order
    pub async fn find_pending(&self) -> Result<Vec<AuditEntryRow>, DatabaseError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM audit_entries WHERE state = 'pending' ORDER BY sequence"
        );
        let rows = sqlx::query_as::<_, AuditEntryRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Finds the committed entry carrying an idempotency key
    pub async fn find_committed_by_key(&self, key: &str) -> Result<Option<AuditEntryRow>, DatabaseError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM audit_entries WHERE idempotency_key = $1 AND state = 'committed'"
        );
        let row = sqlx::query_as::<_, AuditEntryRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
