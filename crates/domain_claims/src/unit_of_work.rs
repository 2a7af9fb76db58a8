//! Ledger-first unit of work
//!
//! A mutation and the audit entry describing it become visible together or
//! not at all:
//!
//! 1. append the entry as `pending`, carrying the prior snapshot
//! 2. write the claim or document under its version check, stamped with the
//!    entry id
//! 3. mark the entry `committed`
//!
//! If step 2 fails the entry is discarded. If step 3 fails the prior snapshot
//! is written back and the entry discarded. Anything left `pending` is settled
//! under the subject lock, either by [`UnitOfWork::recover`] or before the
//! next mutation of the same subject is read.
//!
//! Settling decides from the stamp alone. A subject still carrying the
//! pending entry's id holds that entry's mutation and nothing later, so the
//! prior snapshot is written back. Any other subject state means the mutation
//! never landed or was already rolled back, and the entry is discarded.

use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, instrument, warn};

use core_kernel::{AuditEntryId, ClaimId, DocumentId, PortError};

use crate::audit::{AuditEntry, CommitState, Compensation, NewAuditEntry};
use crate::claim::Claim;
use crate::document::Document;
use crate::ports::{AuditLedgerPort, ClaimPort, DocumentPort};

/// Lock subject for entries that name no claim or document
pub const SYSTEM_SUBJECT: &str = "system";

pub fn claim_subject(id: &ClaimId) -> String {
    format!("claim:{id}")
}

pub fn document_subject(id: &DocumentId) -> String {
    format!("document:{id}")
}

/// Per-subject async mutexes
///
/// Entries are dropped once no task holds them.
#[derive(Debug, Default)]
pub struct SubjectLocks {
    locks: Mutex<HashMap<String, Weak<tokio::sync::Mutex<()>>>>,
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `subject`
    pub async fn acquire(&self, subject: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| lock.strong_count() > 0);
            match locks.get(subject).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(subject.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of subjects currently locked or awaited
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }
}

/// Applies audited mutations against the stores
#[derive(Clone)]
pub struct UnitOfWork {
    claims: Arc<dyn ClaimPort>,
    documents: Arc<dyn DocumentPort>,
    ledger: Arc<dyn AuditLedgerPort>,
    locks: Arc<SubjectLocks>,
}

/// Outcome of settling pending entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Pending entries examined
    pub examined: usize,
    /// Mutations rolled back to their prior snapshot
    pub restored: usize,
    /// Entries discarded
    pub discarded: usize,
    /// Entries left pending for the next sweep
    pub failed: usize,
}

impl RecoveryReport {
    fn absorb(&mut self, other: RecoveryReport) {
        self.examined += other.examined;
        self.restored += other.restored;
        self.discarded += other.discarded;
        self.failed += other.failed;
    }
}

enum Settlement {
    Discarded,
    Restored,
}

impl UnitOfWork {
    pub fn new(
        claims: Arc<dyn ClaimPort>,
        documents: Arc<dyn DocumentPort>,
        ledger: Arc<dyn AuditLedgerPort>,
    ) -> Self {
        Self {
            claims,
            documents,
            ledger,
            locks: Arc::new(SubjectLocks::new()),
        }
    }

    /// Waits for exclusive access to `subject`
    ///
    /// Hold the guard from the read of a subject through [`apply_claim`] or
    /// [`apply_document`].
    ///
    /// [`apply_claim`]: UnitOfWork::apply_claim
    /// [`apply_document`]: UnitOfWork::apply_document
    pub async fn lock(&self, subject: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(subject).await
    }

    /// Reads a claim for mutation, settling anything left pending on it first
    ///
    /// The caller must hold the claim's subject lock.
    pub async fn load_claim(&self, id: &ClaimId) -> Result<Option<Claim>, PortError> {
        self.settle_before_read(&claim_subject(id)).await?;
        self.claims.get_claim(id).await
    }

    /// Reads a document for mutation, settling anything left pending on it first
    ///
    /// The caller must hold the document's subject lock.
    pub async fn load_document(&self, id: &DocumentId) -> Result<Option<Document>, PortError> {
        self.settle_before_read(&document_subject(id)).await?;
        self.documents.get_document(id).await
    }

    async fn settle_before_read(&self, subject: &str) -> Result<(), PortError> {
        let report = self.settle_subject(subject).await?;
        if report.failed > 0 {
            return Err(PortError::conflict(format!(
                "{subject} has {} unsettled pending mutation(s)",
                report.failed
            )));
        }
        Ok(())
    }

    /// Writes `after` over `before` together with `entry`
    ///
    /// `before` must be the claim as last read from the store.
    pub async fn apply_claim(
        &self,
        before: &Claim,
        mut after: Claim,
        entry: NewAuditEntry,
    ) -> Result<(Claim, AuditEntry), PortError> {
        let entry = entry.with_compensation(Compensation::Claim {
            prior: Box::new(before.clone()),
        });
        let pending = self.ledger.append(entry, CommitState::Pending).await?;
        after.last_entry_id = Some(pending.id);

        let stored = match self.claims.update_claim(after, before.version).await {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_quietly(&pending).await;
                return Err(e);
            }
        };

        let claims = Arc::clone(&self.claims);
        let prior = before.clone();
        let version = stored.version;
        self.commit_or_compensate(&pending, move || {
            Box::pin(async move { claims.update_claim(prior, version).await.map(|_| ()) })
        })
        .await?;

        Ok((stored, committed(pending)))
    }

    /// Writes `after` over `before` together with `entry`
    pub async fn apply_document(
        &self,
        before: &Document,
        mut after: Document,
        entry: NewAuditEntry,
    ) -> Result<(Document, AuditEntry), PortError> {
        let entry = entry.with_compensation(Compensation::Document {
            prior: Box::new(before.clone()),
        });
        let pending = self.ledger.append(entry, CommitState::Pending).await?;
        after.last_entry_id = Some(pending.id);

        let stored = match self.documents.update_document(after, before.version).await {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_quietly(&pending).await;
                return Err(e);
            }
        };

        let documents = Arc::clone(&self.documents);
        let prior = before.clone();
        let version = stored.version;
        self.commit_or_compensate(&pending, move || {
            Box::pin(async move { documents.update_document(prior, version).await.map(|_| ()) })
        })
        .await?;

        Ok((stored, committed(pending)))
    }

    async fn commit_or_compensate<F>(&self, pending: &AuditEntry, restore: F) -> Result<(), PortError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), PortError>>,
    {
        let err = match self.ledger.mark_committed(pending.id).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        match restore().await {
            Ok(()) => self.discard_quietly(pending).await,
            Err(restore_err) => warn!(
                entry_id = %pending.id,
                error = %restore_err,
                "Could not restore prior state; entry left pending for recovery"
            ),
        }
        Err(err)
    }

    async fn discard_quietly(&self, pending: &AuditEntry) {
        if let Err(e) = self.ledger.mark_discarded(pending.id).await {
            warn!(entry_id = %pending.id, error = %e, "Could not discard pending audit entry");
        }
    }

    /// Settles every entry left pending
    ///
    /// Subjects are settled one at a time under their lock, so a unit of work
    /// in flight is never mistaken for an interrupted one.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport, PortError> {
        let mut seen = HashSet::new();
        let subjects: Vec<String> = self
            .ledger
            .pending()
            .await?
            .iter()
            .map(subject_of)
            .filter(|subject| seen.insert(subject.clone()))
            .collect();

        let mut report = RecoveryReport::default();
        for subject in subjects {
            let _guard = self.locks.acquire(&subject).await;
            match self.settle_subject(&subject).await {
                Ok(settled) => report.absorb(settled),
                Err(e) => {
                    warn!(subject = %subject, error = %e, "Pending entries not listed");
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                restored = report.restored,
                discarded = report.discarded,
                failed = report.failed,
                "Recovery sweep finished"
            );
        }
        Ok(report)
    }

    /// Settles the entries pending on one subject; the caller holds its lock
    async fn settle_subject(&self, subject: &str) -> Result<RecoveryReport, PortError> {
        let pending: Vec<AuditEntry> = self
            .ledger
            .pending()
            .await?
            .into_iter()
            .filter(|entry| subject_of(entry) == subject)
            .collect();

        let mut report = RecoveryReport {
            examined: pending.len(),
            ..RecoveryReport::default()
        };
        for entry in &pending {
            match self.settle(entry).await {
                Ok(Settlement::Discarded) => report.discarded += 1,
                Ok(Settlement::Restored) => {
                    report.restored += 1;
                    report.discarded += 1;
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "Pending audit entry not settled");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn settle(&self, entry: &AuditEntry) -> Result<Settlement, PortError> {
        let settlement = match &entry.compensation {
            None => Settlement::Discarded,
            Some(Compensation::Claim { prior }) => match self.claims.get_claim(&prior.id).await? {
                Some(current) if written_by(current.last_entry_id, entry.id) => {
                    self.claims
                        .update_claim(prior.as_ref().clone(), current.version)
                        .await?;
                    Settlement::Restored
                }
                _ => Settlement::Discarded,
            },
            Some(Compensation::Document { prior }) => {
                match self.documents.get_document(&prior.id).await? {
                    Some(current) if written_by(current.last_entry_id, entry.id) => {
                        self.documents
                            .update_document(prior.as_ref().clone(), current.version)
                            .await?;
                        Settlement::Restored
                    }
                    _ => Settlement::Discarded,
                }
            }
        };

        self.ledger.mark_discarded(entry.id).await?;
        Ok(settlement)
    }
}

fn committed(mut entry: AuditEntry) -> AuditEntry {
    entry.state = CommitState::Committed;
    entry
}

fn written_by(stamp: Option<AuditEntryId>, entry: AuditEntryId) -> bool {
    stamp == Some(entry)
}

/// Lock subject a pending entry's mutation belongs to
fn subject_of(entry: &AuditEntry) -> String {
    match &entry.compensation {
        Some(Compensation::Claim { prior }) => claim_subject(&prior.id),
        Some(Compensation::Document { prior }) => document_subject(&prior.id),
        None => SYSTEM_SUBJECT.to_string(),
    }
}
