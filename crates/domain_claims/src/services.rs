//! Claims application services
//!
//! [`WebhookService`] is the entry point the HTTP layer calls: normalize,
//! dispatch, and read back the audit trail and timeline.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use core_kernel::{ClaimId, PortError};

use crate::audit::{AuditAction, AuditEntry, CommitState, NewAuditEntry};
use crate::claim::Claim;
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::WebhookError;
use crate::normalizer::{InboundWebhook, WebhookNormalizer};
use crate::ports::{collect_trail, AuditLedgerPort, ClaimPort, DocumentPort};
use crate::signature::SignatureVerifier;
use crate::timeline::{project_claim, TimelineItem};
use crate::unit_of_work::RecoveryReport;

/// Actor recorded on entries written for requests that failed validation
const INGRESS_ACTOR: &str = "webhook:ingress";

/// Webhook ingestion and claim read service
pub struct WebhookService {
    normalizer: WebhookNormalizer,
    dispatcher: EventDispatcher,
    claims: Arc<dyn ClaimPort>,
    ledger: Arc<dyn AuditLedgerPort>,
}

impl WebhookService {
    pub fn new(
        verifier: SignatureVerifier,
        claims: Arc<dyn ClaimPort>,
        documents: Arc<dyn DocumentPort>,
        ledger: Arc<dyn AuditLedgerPort>,
    ) -> Self {
        Self {
            normalizer: WebhookNormalizer::new(verifier),
            dispatcher: EventDispatcher::new(claims.clone(), documents, ledger.clone()),
            claims,
            ledger,
        }
    }

    /// Handles one inbound webhook end to end
    ///
    /// Authentication failures leave no trace in the ledger. A validation
    /// failure that names a claim is recorded against that claim as
    /// `WEBHOOK_REJECTED`.
    pub async fn handle(&self, request: InboundWebhook<'_>) -> Result<DispatchOutcome, WebhookError> {
        let event = match self.normalizer.normalize(&request) {
            Ok(event) => event,
            Err(WebhookError::Validation { message, claim_id: Some(claim_id) }) => {
                self.record_rejection(&claim_id, request.source, &message).await?;
                return Err(WebhookError::Validation { message, claim_id: Some(claim_id) });
            }
            Err(e) => {
                warn!(error = %e, "Webhook rejected");
                return Err(e);
            }
        };

        self.dispatcher.dispatch(&event).await
    }

    async fn record_rejection(
        &self,
        claim_id: &ClaimId,
        source: Option<&str>,
        message: &str,
    ) -> Result<(), WebhookError> {
        warn!(claim_id = %claim_id, message, "Webhook failed validation");
        let actor = source
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("webhook:{s}"))
            .unwrap_or_else(|| INGRESS_ACTOR.to_string());

        let entry = NewAuditEntry::new(
            AuditAction::WebhookRejected,
            actor,
            format!("Webhook rejected: {message}"),
        )
        .for_claim(Some(claim_id.clone()))
        .with_detail("reason", message);
        self.ledger.append(entry, CommitState::Committed).await?;
        Ok(())
    }

    pub async fn claim(&self, claim_id: &ClaimId) -> Result<Option<Claim>, PortError> {
        self.claims.get_claim(claim_id).await
    }

    /// Committed audit entries for a claim, oldest first
    pub async fn audit_trail(&self, claim_id: &ClaimId) -> Result<Vec<AuditEntry>, PortError> {
        collect_trail(self.ledger.as_ref(), claim_id).await
    }

    pub async fn timeline(
        &self,
        claim_id: &ClaimId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimelineItem>, PortError> {
        project_claim(self.ledger.as_ref(), claim_id, now).await
    }

    /// Settles audit entries left pending by an interrupted unit of work
    pub async fn recover(&self) -> Result<RecoveryReport, PortError> {
        let report = self.dispatcher.unit_of_work().recover().await?;
        if report.failed > 0 {
            info!(failed = report.failed, "Some pending entries will be retried on the next sweep");
        }
        Ok(report)
    }
}
