//! Test Data Builders
//!
//! Builders for webhook bodies, signed deliveries, claims, and wired-up
//! in-memory stores. Tests set only the fields they care about.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use core_kernel::ClaimId;
use domain_claims::ports::memory::{InMemoryAuditLedger, InMemoryClaimStore, InMemoryDocumentStore};
use domain_claims::{
    sign_payload, Claim, ClaimStatus, Document, InboundWebhook, SignatureVerifier, WebhookService,
};

use crate::fixtures::{IdFixtures, TemporalFixtures, WEBHOOK_SECRET};

/// Builder for webhook request bodies
#[derive(Debug, Clone)]
pub struct WebhookEventBuilder {
    id: Option<String>,
    event: String,
    timestamp: String,
    data: Map<String, Value>,
}

impl WebhookEventBuilder {
    /// Starts a body of the given event kind, e.g. `payment.issued`
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            id: None,
            event: event.into(),
            timestamp: TemporalFixtures::event_time_rfc3339().to_string(),
            data: Map::new(),
        }
    }

    /// A `payment.issued` body for `claim`
    pub fn payment(claim: &str, payment_id: &str, amount: Value) -> Self {
        Self::new("payment.issued")
            .with_data("claimId", claim)
            .with_data("paymentId", payment_id)
            .with_data("amount", amount)
    }

    /// A `fraud.detected` body for `claim`
    pub fn fraud(claim: &str, score: f64) -> Self {
        Self::new("fraud.detected")
            .with_data("claimId", claim)
            .with_data("score", score)
            .with_data("indicators", json!(["duplicate_vin"]))
    }

    /// A `document.uploaded` body for `document`
    pub fn document(document: &str, claim: &str) -> Self {
        Self::new("document.uploaded")
            .with_data("documentId", document)
            .with_data("claimId", claim)
            .with_data("analysis", json!({ "kind": "repair_estimate" }))
    }

    /// Sets the sender's event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn without_data(mut self, key: &str) -> Self {
        self.data.remove(key);
        self
    }

    /// Builds the JSON body
    pub fn build(self) -> Value {
        let mut body = json!({
            "event": self.event,
            "timestamp": self.timestamp,
            "data": Value::Object(self.data),
        });
        if let (Some(id), Value::Object(map)) = (self.id, &mut body) {
            map.insert("id".to_string(), Value::String(id));
        }
        body
    }

    /// Serializes and signs the body as `source` with the fixture secret
    pub fn signed(self, source: &str) -> SignedWebhook {
        SignedWebhook::new(source, &self.build(), WEBHOOK_SECRET)
    }
}

/// A serialized webhook body with its headers
#[derive(Debug, Clone)]
pub struct SignedWebhook {
    pub source: String,
    pub payload: Vec<u8>,
    pub signature: String,
}

impl SignedWebhook {
    pub fn new(source: &str, body: &Value, secret: &str) -> Self {
        let payload = serde_json::to_vec(body).unwrap();
        let signature = sign_payload(secret, &payload);
        Self {
            source: source.to_string(),
            payload,
            signature,
        }
    }

    /// Replaces the signature with one that will not verify
    pub fn tampered(mut self) -> Self {
        self.signature = sign_payload("not-the-secret", &self.payload);
        self
    }

    pub fn inbound(&self) -> InboundWebhook<'_> {
        InboundWebhook {
            payload: &self.payload,
            signature: Some(&self.signature),
            source: Some(&self.source),
        }
    }
}

/// Builder for claims
pub struct ClaimBuilder {
    claim: Claim,
}

impl ClaimBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            claim: Claim::submitted(IdFixtures::claim(id)),
        }
    }

    pub fn with_status(mut self, status: ClaimStatus) -> Self {
        self.claim.lifecycle_status = status;
        self
    }

    pub fn with_fraud_score(mut self, score: f64) -> Self {
        let at = self.claim.updated_at;
        self.claim
            .record_fraud_assessment(score, Vec::new(), at)
            .unwrap();
        self
    }

    pub fn with_payment(mut self, payment_id: &str, amount: Decimal, at: DateTime<Utc>) -> Self {
        self.claim.lifecycle_status = ClaimStatus::Paid;
        self.claim.payment_id = Some(payment_id.to_string());
        self.claim.payment_amount = Some(amount);
        self.claim.paid_at = Some(at);
        self
    }

    pub fn build(self) -> Claim {
        self.claim
    }
}

/// In-memory stores wired to a [`WebhookService`] signing with
/// [`WEBHOOK_SECRET`]
pub struct TestStores {
    pub claims: Arc<InMemoryClaimStore>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub ledger: Arc<InMemoryAuditLedger>,
    pub service: WebhookService,
}

impl TestStores {
    pub async fn new(claims: Vec<Claim>, documents: Vec<Document>) -> Self {
        let claims = Arc::new(InMemoryClaimStore::with_claims(claims).await);
        let documents = Arc::new(InMemoryDocumentStore::with_documents(documents).await);
        let ledger = Arc::new(InMemoryAuditLedger::new());
        let service = WebhookService::new(
            SignatureVerifier::new(WEBHOOK_SECRET),
            claims.clone(),
            documents.clone(),
            ledger.clone(),
        );
        Self {
            claims,
            documents,
            ledger,
            service,
        }
    }

    pub async fn with_claims(claims: Vec<Claim>) -> Self {
        Self::new(claims, Vec::new()).await
    }

    /// Reads a claim that must exist
    pub async fn claim(&self, id: &str) -> Claim {
        let id: ClaimId = IdFixtures::claim(id);
        self.service.claim(&id).await.unwrap().unwrap()
    }
}
