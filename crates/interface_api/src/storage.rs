//! Storage wiring
//!
//! Builds the port implementations for the configured backend.

use std::sync::Arc;

use core_kernel::HealthCheckable;
use domain_claims::ports::memory::{InMemoryAuditLedger, InMemoryClaimStore, InMemoryDocumentStore};
use domain_claims::{AuditLedgerPort, ClaimPort, DocumentPort};
use infra_db::{DatabasePool, PostgresAuditLedger, PostgresClaimAdapter, PostgresDocumentAdapter};

/// The three stores behind the webhook service, plus their health probes
#[derive(Clone)]
pub struct Storage {
    pub claims: Arc<dyn ClaimPort>,
    pub documents: Arc<dyn DocumentPort>,
    pub ledger: Arc<dyn AuditLedgerPort>,
    pub probes: Vec<Arc<dyn HealthCheckable>>,
}

impl Storage {
    pub fn postgres(pool: DatabasePool) -> Self {
        let claims = Arc::new(PostgresClaimAdapter::new(pool.clone()));
        let documents = Arc::new(PostgresDocumentAdapter::new(pool.clone()));
        let ledger = Arc::new(PostgresAuditLedger::new(pool));
        Self {
            probes: vec![
                claims.clone() as Arc<dyn HealthCheckable>,
                documents.clone() as Arc<dyn HealthCheckable>,
                ledger.clone() as Arc<dyn HealthCheckable>,
            ],
            claims,
            documents,
            ledger,
        }
    }

    /// Empty process-local stores
    pub fn memory() -> Self {
        Self::in_memory(
            Arc::new(InMemoryClaimStore::new()),
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAuditLedger::new()),
        )
    }

    /// Wraps existing in-memory stores, so callers can seed and inspect them
    pub fn in_memory(
        claims: Arc<InMemoryClaimStore>,
        documents: Arc<InMemoryDocumentStore>,
        ledger: Arc<InMemoryAuditLedger>,
    ) -> Self {
        Self {
            probes: vec![
                claims.clone() as Arc<dyn HealthCheckable>,
                documents.clone() as Arc<dyn HealthCheckable>,
                ledger.clone() as Arc<dyn HealthCheckable>,
            ],
            claims,
            documents,
            ledger,
        }
    }
}
