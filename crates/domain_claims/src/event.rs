//! Canonical webhook events
//!
//! Inbound payloads from every external system are normalized into a
//! [`CanonicalWebhookEvent`]: a closed event kind, a closed source, and a
//! payload typed per kind. Nothing downstream reads untyped fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ClaimId, DocumentId};

use crate::unit_of_work::{claim_subject, document_subject, SYSTEM_SUBJECT};

/// Kind of an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "claim.created")]
    ClaimCreated,
    #[serde(rename = "claim.updated")]
    ClaimUpdated,
    #[serde(rename = "claim.approved")]
    ClaimApproved,
    #[serde(rename = "claim.rejected")]
    ClaimRejected,
    #[serde(rename = "claim.paid")]
    ClaimPaid,
    #[serde(rename = "document.uploaded")]
    DocumentUploaded,
    #[serde(rename = "fraud.detected")]
    FraudDetected,
    #[serde(rename = "payment.issued")]
    PaymentIssued,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::ClaimCreated,
        EventKind::ClaimUpdated,
        EventKind::ClaimApproved,
        EventKind::ClaimRejected,
        EventKind::ClaimPaid,
        EventKind::DocumentUploaded,
        EventKind::FraudDetected,
        EventKind::PaymentIssued,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ClaimCreated => "claim.created",
            EventKind::ClaimUpdated => "claim.updated",
            EventKind::ClaimApproved => "claim.approved",
            EventKind::ClaimRejected => "claim.rejected",
            EventKind::ClaimPaid => "claim.paid",
            EventKind::DocumentUploaded => "document.uploaded",
            EventKind::FraudDetected => "fraud.detected",
            EventKind::PaymentIssued => "payment.issued",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unrecognized event kind '{}'", s))
    }
}

/// External system an event came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventSource {
    PaymentGateway,
    FraudService,
    DocumentService,
    /// Any tag not listed above, kept verbatim
    Unrecognized(String),
}

impl EventSource {
    /// Maps a `source-tag` header value to a source; never fails
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "payment-gateway" => EventSource::PaymentGateway,
            "fraud-service" => EventSource::FraudService,
            "document-service" => EventSource::DocumentService,
            _ => EventSource::Unrecognized(tag.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventSource::PaymentGateway => "payment-gateway",
            EventSource::FraudService => "fraud-service",
            EventSource::DocumentService => "document-service",
            EventSource::Unrecognized(tag) => tag,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, EventSource::Unrecognized(_))
    }

    /// Actor tag recorded on audit entries written for this source
    pub fn actor(&self) -> String {
        format!("webhook:{}", self.as_str())
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `payment.issued` payload
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIssued {
    pub claim_id: ClaimId,
    pub payment_id: String,
    pub amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

/// `fraud.detected` payload
#[derive(Debug, Clone, PartialEq)]
pub struct FraudDetected {
    pub claim_id: ClaimId,
    pub score: f64,
    pub indicators: Vec<String>,
}

/// `document.uploaded` payload
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUploaded {
    pub document_id: DocumentId,
    pub claim_id: Option<ClaimId>,
    pub analysis: Map<String, Value>,
}

/// Payload typed per event kind
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    PaymentIssued(PaymentIssued),
    FraudDetected(FraudDetected),
    DocumentUploaded(DocumentUploaded),
    /// `claim.*` notifications, which carry only the claim reference
    ClaimLifecycle { claim_id: ClaimId },
}

impl EventPayload {
    pub fn claim_id(&self) -> Option<&ClaimId> {
        match self {
            EventPayload::PaymentIssued(p) => Some(&p.claim_id),
            EventPayload::FraudDetected(f) => Some(&f.claim_id),
            EventPayload::DocumentUploaded(d) => d.claim_id.as_ref(),
            EventPayload::ClaimLifecycle { claim_id } => Some(claim_id),
        }
    }
}

/// A validated inbound event
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalWebhookEvent {
    pub kind: EventKind,
    /// Time the sender says the event happened
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    /// The `data` object as received
    pub data: Map<String, Value>,
    pub payload: EventPayload,
    /// Sender-assigned event id, used as the idempotency nonce
    pub external_id: Option<String>,
    /// Verified signature token
    pub signature: String,
}

impl CanonicalWebhookEvent {
    pub fn claim_id(&self) -> Option<&ClaimId> {
        self.payload.claim_id()
    }

    /// Entity whose mutations this event must be serialized against
    pub fn subject(&self) -> String {
        match &self.payload {
            EventPayload::DocumentUploaded(d) => document_subject(&d.document_id),
            other => match other.claim_id() {
                Some(claim_id) => claim_subject(claim_id),
                None => SYSTEM_SUBJECT.to_string(),
            },
        }
    }

    /// Stable key identifying a delivery of this event
    ///
    /// Derived from source, kind, subject, and the sender's event id. Senders
    /// that omit an id get a digest of the `data` object instead, so a
    /// verbatim redelivery still maps to the same key.
    pub fn idempotency_key(&self) -> String {
        let nonce = match &self.external_id {
            Some(id) => format!("id:{}", id),
            None => {
                let canonical = Value::Object(self.data.clone()).to_string();
                format!("data:{}", hex::encode(Sha256::digest(canonical.as_bytes())))
            }
        };

        let subject = self.subject();
        let mut hasher = Sha256::new();
        for part in [self.source.as_str(), self.kind.as_str(), subject.as_str(), nonce.as_str()] {
            hasher.update(part.as_bytes());
            hasher.update(b"\x1f");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_parse() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("claim.deleted".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_source_tags() {
        assert_eq!(EventSource::from_tag("Payment-Gateway"), EventSource::PaymentGateway);
        assert_eq!(
            EventSource::from_tag("unrecognized-system"),
            EventSource::Unrecognized("unrecognized-system".to_string())
        );
        assert_eq!(EventSource::FraudService.actor(), "webhook:fraud-service");
    }
}
