//! Claims Domain Ports
//!
//! Port interfaces for the stores the webhook pipeline depends on. Adapters
//! live in `infra_db` (PostgreSQL) and in [`memory`] (tests and the
//! in-process backend).
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_claims::ports::{AuditLedgerPort, ClaimPort};
//! use std::sync::Arc;
//!
//! pub struct ClaimReader {
//!     claims: Arc<dyn ClaimPort>,
//!     ledger: Arc<dyn AuditLedgerPort>,
//! }
//! ```
//!
//! # Versions
//!
//! Every stored claim and document carries a version. Writers pass the
//! version they read; the store rejects the write with
//! [`PortError::Conflict`] if it has moved on, and bumps it otherwise.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::TryStreamExt;

use core_kernel::{AuditEntryId, ClaimId, DocumentId, DomainPort, HealthCheckable, PortError};

use crate::audit::{AuditEntry, CommitState, NewAuditEntry};
use crate::claim::Claim;
use crate::document::Document;

/// Claim state store
#[async_trait]
pub trait ClaimPort: DomainPort + HealthCheckable {
    /// Retrieves a claim, or `None` if it does not exist
    async fn get_claim(&self, id: &ClaimId) -> Result<Option<Claim>, PortError>;

    /// Stores a new claim at version 1
    ///
    /// Fails with `Conflict` if the id is taken.
    async fn insert_claim(&self, claim: Claim) -> Result<Claim, PortError>;

    /// Replaces a claim if its stored version equals `expected_version`
    ///
    /// Returns the stored claim with its new version.
    async fn update_claim(&self, claim: Claim, expected_version: i64) -> Result<Claim, PortError>;
}

/// Document store
#[async_trait]
pub trait DocumentPort: DomainPort + HealthCheckable {
    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>, PortError>;

    async fn insert_document(&self, document: Document) -> Result<Document, PortError>;

    async fn update_document(
        &self,
        document: Document,
        expected_version: i64,
    ) -> Result<Document, PortError>;
}

/// Append-only audit ledger
///
/// Entries cannot be edited or removed. Only the commit state moves, and
/// only out of [`CommitState::Pending`].
#[async_trait]
pub trait AuditLedgerPort: DomainPort + HealthCheckable {
    /// Appends an entry in the given state and returns it as stored
    ///
    /// The ledger assigns id, sequence, and timestamp. Timestamps never go
    /// backwards relative to earlier appends for the same claim.
    async fn append(&self, entry: NewAuditEntry, state: CommitState) -> Result<AuditEntry, PortError>;

    /// Makes a pending entry visible to readers
    ///
    /// Fails with `Conflict` if the entry is no longer pending or another
    /// committed entry already carries its idempotency key.
    async fn mark_committed(&self, id: AuditEntryId) -> Result<(), PortError>;

    /// Retires a pending entry whose mutation never took effect
    async fn mark_discarded(&self, id: AuditEntryId) -> Result<(), PortError>;

    /// Streams the committed entries of a claim, oldest first
    ///
    /// Ordered by timestamp, then sequence. Each call starts a fresh stream.
    fn query<'a>(&'a self, claim_id: &'a ClaimId) -> BoxStream<'a, Result<AuditEntry, PortError>>;

    /// Lists entries still pending, oldest first
    async fn pending(&self) -> Result<Vec<AuditEntry>, PortError>;

    /// Finds the committed entry tagged with an idempotency key
    async fn find_committed_by_key(&self, key: &str) -> Result<Option<AuditEntry>, PortError>;
}

/// Collects a claim's audit trail into memory
pub async fn collect_trail(
    ledger: &dyn AuditLedgerPort,
    claim_id: &ClaimId,
) -> Result<Vec<AuditEntry>, PortError> {
    ledger.query(claim_id).try_collect().await
}

/// In-memory adapters
///
/// Backed by `tokio::sync::RwLock` maps. Each adapter can be told to fail
/// specific operations so the unit-of-work and recovery paths can be driven
/// from tests.
#[cfg(any(test, feature = "memory"))]
pub mod memory {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use futures::stream::{self, StreamExt};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult};
    use crate::audit::AuditAction;

    fn healthy(adapter_id: &str) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: Some("In-memory adapter".to_string()),
            checked_at: Utc::now(),
        }
    }

    fn injected(operation: &str) -> PortError {
        PortError::connection(format!("injected failure: {operation}"))
    }

    /// In-memory claim store
    #[derive(Debug, Default)]
    pub struct InMemoryClaimStore {
        claims: Arc<RwLock<HashMap<ClaimId, Claim>>>,
        fail_updates: AtomicBool,
    }

    impl InMemoryClaimStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates the store; each claim is stored at version 1
        pub async fn with_claims(claims: Vec<Claim>) -> Self {
            let store = Self::new();
            {
                let mut map = store.claims.write().await;
                for mut claim in claims {
                    claim.version = 1;
                    map.insert(claim.id.clone(), claim);
                }
            }
            store
        }

        /// Makes every `update_claim` call fail until reset
        pub fn fail_updates(&self, fail: bool) {
            self.fail_updates.store(fail, Ordering::SeqCst);
        }
    }

    impl DomainPort for InMemoryClaimStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryClaimStore {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("memory-claim-store")
        }
    }

    #[async_trait]
    impl ClaimPort for InMemoryClaimStore {
        async fn get_claim(&self, id: &ClaimId) -> Result<Option<Claim>, PortError> {
            Ok(self.claims.read().await.get(id).cloned())
        }

        async fn insert_claim(&self, mut claim: Claim) -> Result<Claim, PortError> {
            let mut claims = self.claims.write().await;
            if claims.contains_key(&claim.id) {
                return Err(PortError::conflict(format!("claim {} already exists", claim.id)));
            }
            claim.version = 1;
            claims.insert(claim.id.clone(), claim.clone());
            Ok(claim)
        }

        async fn update_claim(&self, mut claim: Claim, expected_version: i64) -> Result<Claim, PortError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(injected("update_claim"));
            }
            let mut claims = self.claims.write().await;
            let stored = claims
                .get_mut(&claim.id)
                .ok_or_else(|| PortError::not_found("Claim", &claim.id))?;
            if stored.version != expected_version {
                return Err(PortError::conflict(format!(
                    "claim {} is at version {}, expected {}",
                    claim.id, stored.version, expected_version
                )));
            }
            claim.version = expected_version + 1;
            *stored = claim.clone();
            Ok(claim)
        }
    }

    /// In-memory document store
    #[derive(Debug, Default)]
    pub struct InMemoryDocumentStore {
        documents: Arc<RwLock<HashMap<DocumentId, Document>>>,
        fail_updates: AtomicBool,
    }

    impl InMemoryDocumentStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_documents(documents: Vec<Document>) -> Self {
            let store = Self::new();
            {
                let mut map = store.documents.write().await;
                for mut document in documents {
                    document.version = 1;
                    map.insert(document.id.clone(), document);
                }
            }
            store
        }

        pub fn fail_updates(&self, fail: bool) {
            self.fail_updates.store(fail, Ordering::SeqCst);
        }
    }

    impl DomainPort for InMemoryDocumentStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryDocumentStore {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("memory-document-store")
        }
    }

    #[async_trait]
    impl DocumentPort for InMemoryDocumentStore {
        async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>, PortError> {
            Ok(self.documents.read().await.get(id).cloned())
        }

        async fn insert_document(&self, mut document: Document) -> Result<Document, PortError> {
            let mut documents = self.documents.write().await;
            if documents.contains_key(&document.id) {
                return Err(PortError::conflict(format!("document {} already exists", document.id)));
            }
            document.version = 1;
            documents.insert(document.id.clone(), document.clone());
            Ok(document)
        }

        async fn update_document(
            &self,
            mut document: Document,
            expected_version: i64,
        ) -> Result<Document, PortError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(injected("update_document"));
            }
            let mut documents = self.documents.write().await;
            let stored = documents
                .get_mut(&document.id)
                .ok_or_else(|| PortError::not_found("Document", &document.id))?;
            if stored.version != expected_version {
                return Err(PortError::conflict(format!(
                    "document {} is at version {}, expected {}",
                    document.id, stored.version, expected_version
                )));
            }
            document.version = expected_version + 1;
            *stored = document.clone();
            Ok(document)
        }
    }

    #[derive(Debug, Default)]
    struct LedgerState {
        entries: Vec<AuditEntry>,
        last_timestamp: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Default)]
    struct LedgerFaults {
        append_actions: HashSet<AuditAction>,
        state_changes: bool,
    }

    /// In-memory audit ledger
    #[derive(Debug, Default)]
    pub struct InMemoryAuditLedger {
        state: Arc<RwLock<LedgerState>>,
        faults: Mutex<LedgerFaults>,
    }

    impl InMemoryAuditLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes appends of the given action fail until cleared
        pub fn fail_appends_for(&self, action: AuditAction) {
            self.faults().append_actions.insert(action);
        }

        /// Makes `mark_committed` and `mark_discarded` fail until reset
        pub fn fail_state_changes(&self, fail: bool) {
            self.faults().state_changes = fail;
        }

        /// Clears every injected fault
        pub fn clear_faults(&self) {
            *self.faults() = LedgerFaults::default();
        }

        /// Every entry in append order, whatever its state
        pub async fn all_entries(&self) -> Vec<AuditEntry> {
            self.state.read().await.entries.clone()
        }

        fn faults(&self) -> std::sync::MutexGuard<'_, LedgerFaults> {
            self.faults.lock().unwrap_or_else(PoisonError::into_inner)
        }

        async fn advance(&self, id: AuditEntryId, target: CommitState) -> Result<(), PortError> {
            let fail = self.faults().state_changes;
            if fail {
                return Err(injected("commit state change"));
            }
            let mut state = self.state.write().await;

            if target == CommitState::Committed {
                let key = state
                    .entries
                    .iter()
                    .find(|e| e.id == id)
                    .and_then(|e| e.idempotency_key.clone());
                if let Some(key) = key {
                    let taken = state.entries.iter().any(|e| {
                        e.id != id && e.is_committed() && e.idempotency_key.as_deref() == Some(&key)
                    });
                    if taken {
                        return Err(PortError::conflict(format!(
                            "idempotency key {key} is already committed"
                        )));
                    }
                }
            }

            let entry = state
                .entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| PortError::not_found("AuditEntry", id))?;
            if entry.state != CommitState::Pending {
                return Err(PortError::conflict(format!(
                    "audit entry {} is {}, not pending",
                    id,
                    entry.state.as_str()
                )));
            }
            entry.state = target;
            Ok(())
        }
    }

    impl DomainPort for InMemoryAuditLedger {}

    #[async_trait]
    impl HealthCheckable for InMemoryAuditLedger {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("memory-audit-ledger")
        }
    }

    #[async_trait]
    impl AuditLedgerPort for InMemoryAuditLedger {
        async fn append(&self, entry: NewAuditEntry, commit_state: CommitState) -> Result<AuditEntry, PortError> {
            let fail = self.faults().append_actions.contains(&entry.action);
            if fail {
                return Err(injected("append"));
            }
            let mut state = self.state.write().await;

            let now = Utc::now();
            let timestamp = match state.last_timestamp {
                Some(last) if now <= last => last + Duration::microseconds(1),
                _ => now,
            };
            state.last_timestamp = Some(timestamp);

            let sequence = state.entries.len() as i64 + 1;
            let stored = AuditEntry::from_new(entry, AuditEntryId::new_v7(), sequence, timestamp, commit_state);
            state.entries.push(stored.clone());
            Ok(stored)
        }

        async fn mark_committed(&self, id: AuditEntryId) -> Result<(), PortError> {
            self.advance(id, CommitState::Committed).await
        }

        async fn mark_discarded(&self, id: AuditEntryId) -> Result<(), PortError> {
            self.advance(id, CommitState::Discarded).await
        }

        fn query<'a>(&'a self, claim_id: &'a ClaimId) -> BoxStream<'a, Result<AuditEntry, PortError>> {
            stream::once(async move {
                let state = self.state.read().await;
                let mut entries: Vec<AuditEntry> = state
                    .entries
                    .iter()
                    .filter(|e| e.is_committed() && e.claim_id.as_ref() == Some(claim_id))
                    .cloned()
                    .collect();
                entries.sort_by(|a, b| (a.timestamp, a.sequence).cmp(&(b.timestamp, b.sequence)));
                stream::iter(entries.into_iter().map(Ok))
            })
            .flatten()
            .boxed()
        }

        async fn pending(&self) -> Result<Vec<AuditEntry>, PortError> {
            let state = self.state.read().await;
            Ok(state
                .entries
                .iter()
                .filter(|e| e.state == CommitState::Pending)
                .cloned()
                .collect())
        }

        async fn find_committed_by_key(&self, key: &str) -> Result<Option<AuditEntry>, PortError> {
            let state = self.state.read().await;
            Ok(state
                .entries
                .iter()
                .find(|e| e.is_committed() && e.idempotency_key.as_deref() == Some(key))
                .cloned())
        }
    }

}
