//! Event dispatcher
//!
//! Routes a canonical event to the handler for its (source, kind) pairing and
//! applies the resulting claim or document mutation through the
//! [`UnitOfWork`]. Every delivery leaves a `WEBHOOK_RECEIVED` receipt; a
//! delivery that changes nothing also leaves a `WEBHOOK_SKIPPED` entry saying
//! why.
//!
//! Deliveries for the same subject are serialized by the unit of work's
//! subject locks, which the recovery sweep takes too. Stores still check
//! versions, which covers writers outside this process.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::audit::{AuditAction, CommitState, NewAuditEntry};
use crate::error::{ClaimError, WebhookError};
use crate::event::{
    CanonicalWebhookEvent, DocumentUploaded, EventPayload, EventSource, FraudDetected,
    PaymentIssued,
};
use crate::claim::FRAUD_THRESHOLD;
use crate::ports::{AuditLedgerPort, ClaimPort, DocumentPort};
use crate::unit_of_work::UnitOfWork;

/// What the dispatcher did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchAction {
    PaymentConfirmed,
    FraudFlagged,
    FraudScoreUpdated,
    DocumentAnalyzed,
    /// Source not recognized; held for manual handling
    Queued,
    Ignored,
    DuplicateSkipped,
}

impl DispatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchAction::PaymentConfirmed => "payment_confirmed",
            DispatchAction::FraudFlagged => "fraud_flagged",
            DispatchAction::FraudScoreUpdated => "fraud_score_updated",
            DispatchAction::DocumentAnalyzed => "document_analyzed",
            DispatchAction::Queued => "queued",
            DispatchAction::Ignored => "ignored",
            DispatchAction::DuplicateSkipped => "duplicate_skipped",
        }
    }
}

/// Processing status reported to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Complete,
    Pending,
    Ignored,
}

/// Why a delivery changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Duplicate,
    ClaimNotFound,
    DocumentNotFound,
    InvalidTransition,
    Unhandled,
    Queued,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Duplicate => "duplicate",
            SkipReason::ClaimNotFound => "claim_not_found",
            SkipReason::DocumentNotFound => "document_not_found",
            SkipReason::InvalidTransition => "invalid_transition",
            SkipReason::Unhandled => "unhandled",
            SkipReason::Queued => "queued",
        }
    }
}

/// Result of dispatching one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub action: DispatchAction,
    pub status: DispatchStatus,
}

impl DispatchOutcome {
    pub fn complete(action: DispatchAction) -> Self {
        Self { action, status: DispatchStatus::Complete }
    }

    pub fn ignored() -> Self {
        Self { action: DispatchAction::Ignored, status: DispatchStatus::Ignored }
    }
}

/// Routes canonical events to their handlers
pub struct EventDispatcher {
    ledger: Arc<dyn AuditLedgerPort>,
    unit_of_work: UnitOfWork,
}

impl EventDispatcher {
    pub fn new(
        claims: Arc<dyn ClaimPort>,
        documents: Arc<dyn DocumentPort>,
        ledger: Arc<dyn AuditLedgerPort>,
    ) -> Self {
        let unit_of_work = UnitOfWork::new(claims, documents, ledger.clone());
        Self { ledger, unit_of_work }
    }

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.unit_of_work
    }

    /// Dispatches one event
    ///
    /// Missing entities and status-rule violations are recorded and reported
    /// as ignored. Only storage failures are returned as errors; the event can
    /// then be redelivered as is.
    #[instrument(skip_all, fields(kind = %event.kind, source = %event.source))]
    pub async fn dispatch(&self, event: &CanonicalWebhookEvent) -> Result<DispatchOutcome, WebhookError> {
        let subject = event.subject();
        let key = event.idempotency_key();
        let _guard = self.unit_of_work.lock(&subject).await;

        self.ledger.append(receipt(event), CommitState::Committed).await?;

        if let Some(previous) = self.ledger.find_committed_by_key(&key).await? {
            debug!(subject = %subject, previous = %previous.id, "Duplicate delivery");
            self.skip(event, SkipReason::Duplicate, "event already applied").await?;
            return Ok(DispatchOutcome {
                action: DispatchAction::DuplicateSkipped,
                status: DispatchStatus::Ignored,
            });
        }

        let outcome = match self.route(event, &key).await {
            Ok(outcome) => outcome,
            Err(WebhookError::NotFound(message)) => {
                let reason = match event.payload {
                    EventPayload::DocumentUploaded(_) => SkipReason::DocumentNotFound,
                    _ => SkipReason::ClaimNotFound,
                };
                self.skip(event, reason, &message).await?;
                DispatchOutcome::ignored()
            }
            Err(WebhookError::InvalidTransition(message)) => {
                self.skip(event, SkipReason::InvalidTransition, &message).await?;
                DispatchOutcome::ignored()
            }
            Err(e) => return Err(e),
        };

        info!(
            subject = %subject,
            action = outcome.action.as_str(),
            "Webhook dispatched"
        );
        Ok(outcome)
    }

    async fn route(&self, event: &CanonicalWebhookEvent, key: &str) -> Result<DispatchOutcome, WebhookError> {
        match (&event.source, &event.payload) {
            (EventSource::PaymentGateway, EventPayload::PaymentIssued(payment)) => {
                self.confirm_payment(event, payment, key).await
            }
            (EventSource::FraudService, EventPayload::FraudDetected(assessment)) => {
                self.assess_fraud(event, assessment, key).await
            }
            (EventSource::DocumentService, EventPayload::DocumentUploaded(upload)) => {
                self.analyze_document(event, upload, key).await
            }
            (EventSource::Unrecognized(_), _) => {
                self.skip(event, SkipReason::Queued, "source not recognized").await?;
                Ok(DispatchOutcome {
                    action: DispatchAction::Queued,
                    status: DispatchStatus::Pending,
                })
            }
            _ => {
                self.skip(event, SkipReason::Unhandled, "no handler for this source and event")
                    .await?;
                Ok(DispatchOutcome::ignored())
            }
        }
    }

    async fn confirm_payment(
        &self,
        event: &CanonicalWebhookEvent,
        payment: &PaymentIssued,
        key: &str,
    ) -> Result<DispatchOutcome, WebhookError> {
        let before = self
            .unit_of_work
            .load_claim(&payment.claim_id)
            .await?
            .ok_or_else(|| ClaimError::ClaimNotFound(payment.claim_id.to_string()))?;

        let paid_at = payment.paid_at.unwrap_or(event.timestamp);
        let mut after = before.clone();
        after.record_payment(payment.payment_id.as_str(), payment.amount, paid_at)?;
        after.updated_at = Utc::now();

        let entry = NewAuditEntry::new(
            AuditAction::PaymentConfirmed,
            event.source.actor(),
            format!("Payment {} of {} confirmed", payment.payment_id, payment.amount),
        )
        .for_claim(Some(payment.claim_id.clone()))
        .with_detail("paymentId", payment.payment_id.as_str())
        .with_detail("amount", amount_json(payment.amount))
        .with_detail("paidAt", paid_at.to_rfc3339())
        .with_detail("previousStatus", before.status().as_str())
        .with_idempotency_key(key);

        self.unit_of_work.apply_claim(&before, after, entry).await?;
        Ok(DispatchOutcome::complete(DispatchAction::PaymentConfirmed))
    }

    async fn assess_fraud(
        &self,
        event: &CanonicalWebhookEvent,
        assessment: &FraudDetected,
        key: &str,
    ) -> Result<DispatchOutcome, WebhookError> {
        let before = self
            .unit_of_work
            .load_claim(&assessment.claim_id)
            .await?
            .ok_or_else(|| ClaimError::ClaimNotFound(assessment.claim_id.to_string()))?;

        let mut after = before.clone();
        let exceeds = after.record_fraud_assessment(
            assessment.score,
            assessment.indicators.clone(),
            Utc::now(),
        )?;

        let (action, audit_action, description) = if exceeds {
            (
                DispatchAction::FraudFlagged,
                AuditAction::FraudAlert,
                format!("Claim flagged for fraud (score {})", assessment.score),
            )
        } else {
            (
                DispatchAction::FraudScoreUpdated,
                AuditAction::FraudScoreUpdated,
                format!("Fraud score updated to {}", assessment.score),
            )
        };

        let entry = NewAuditEntry::new(audit_action, event.source.actor(), description)
            .for_claim(Some(assessment.claim_id.clone()))
            .with_detail("score", assessment.score)
            .with_detail("threshold", FRAUD_THRESHOLD)
            .with_detail("indicators", assessment.indicators.clone())
            .with_detail("previousStatus", before.status().as_str())
            .with_idempotency_key(key);

        self.unit_of_work.apply_claim(&before, after, entry).await?;
        Ok(DispatchOutcome::complete(action))
    }

    async fn analyze_document(
        &self,
        event: &CanonicalWebhookEvent,
        upload: &DocumentUploaded,
        key: &str,
    ) -> Result<DispatchOutcome, WebhookError> {
        let before = self
            .unit_of_work
            .load_document(&upload.document_id)
            .await?
            .ok_or_else(|| ClaimError::DocumentNotFound(upload.document_id.to_string()))?;

        let mut after = before.clone();
        after.mark_analyzed(upload.analysis.clone(), Utc::now());

        let linked_claim = upload
            .claim_id
            .as_ref()
            .or(before.claim_id.as_ref())
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null);

        let entry = NewAuditEntry::new(
            AuditAction::DocumentAnalyzed,
            event.source.actor(),
            format!("Document {} analyzed", upload.document_id),
        )
        .with_detail("documentId", upload.document_id.as_str())
        .with_detail("claimId", linked_claim)
        .with_detail("analysis", Value::Object(upload.analysis.clone()))
        .with_idempotency_key(key);

        self.unit_of_work.apply_document(&before, after, entry).await?;
        Ok(DispatchOutcome::complete(DispatchAction::DocumentAnalyzed))
    }

    async fn skip(
        &self,
        event: &CanonicalWebhookEvent,
        reason: SkipReason,
        message: &str,
    ) -> Result<(), WebhookError> {
        debug!(reason = reason.as_str(), message, "Webhook skipped");
        let entry = NewAuditEntry::new(
            AuditAction::WebhookSkipped,
            event.source.actor(),
            format!("{} skipped: {}", event.kind, message),
        )
        .for_claim(event.claim_id().cloned())
        .with_detail("reason", reason.as_str())
        .with_detail("event", event.kind.as_str())
        .with_detail("message", message);
        self.ledger.append(entry, CommitState::Committed).await?;
        Ok(())
    }
}

fn receipt(event: &CanonicalWebhookEvent) -> NewAuditEntry {
    let mut entry = NewAuditEntry::new(
        AuditAction::WebhookReceived,
        event.source.actor(),
        format!("Received {} from {}", event.kind, event.source),
    )
    .for_claim(event.claim_id().cloned())
    .with_detail("event", event.kind.as_str())
    .with_detail("source", event.source.as_str())
    .with_detail("eventTimestamp", event.timestamp.to_rfc3339());
    if let Some(id) = &event.external_id {
        entry = entry.with_detail("eventId", id.as_str());
    }
    entry
}

/// Renders an amount as a JSON number
fn amount_json(amount: Decimal) -> Value {
    Number::from_str(&amount.normalize().to_string())
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_renders_as_number() {
        assert_eq!(amount_json(dec!(4200)), serde_json::json!(4200));
        assert_eq!(amount_json(dec!(4200.00)), serde_json::json!(4200));
        assert_eq!(amount_json(dec!(12.5)), serde_json::json!(12.5));
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = DispatchOutcome {
            action: DispatchAction::DuplicateSkipped,
            status: DispatchStatus::Ignored,
        };
        assert_eq!(
            serde_json::to_value(outcome).unwrap(),
            serde_json::json!({"action": "duplicate_skipped", "status": "ignored"})
        );
    }
}
