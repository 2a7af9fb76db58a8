//! Domain Adapters
//!
//! Implementations of the `domain_claims` ports on PostgreSQL. Each adapter
//! wraps a repository and translates between row and domain types.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresClaimAdapter;
//! use domain_claims::ClaimPort;
//! use std::sync::Arc;
//!
//! let claims: Arc<dyn ClaimPort> = Arc::new(PostgresClaimAdapter::new(pool));
//! ```

pub mod audit;
pub mod claims;
pub mod documents;

pub use audit::PostgresAuditLedger;
pub use claims::PostgresClaimAdapter;
pub use documents::PostgresDocumentAdapter;

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, HealthCheckResult};

/// Runs `SELECT 1` and reports the outcome as `adapter_id`
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await;

    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}
