//! Webhook normalizer tests

use rust_decimal_macros::dec;
use serde_json::{json, Value};

use domain_claims::error::WebhookError;
use domain_claims::event::{EventKind, EventPayload, EventSource};
use domain_claims::normalizer::{InboundWebhook, WebhookNormalizer};
use domain_claims::signature::{sign_payload, SignatureVerifier};

const SECRET: &str = "whsec_normalizer";

fn normalizer() -> WebhookNormalizer {
    WebhookNormalizer::new(SignatureVerifier::new(SECRET))
}

fn normalize_raw(payload: &[u8], source: Option<&str>) -> Result<domain_claims::CanonicalWebhookEvent, WebhookError> {
    let signature = sign_payload(SECRET, payload);
    normalizer().normalize(&InboundWebhook {
        payload,
        signature: Some(&signature),
        source,
    })
}

fn normalize(body: &Value, source: &str) -> Result<domain_claims::CanonicalWebhookEvent, WebhookError> {
    normalize_raw(&serde_json::to_vec(body).unwrap(), Some(source))
}

fn validation_message(result: Result<domain_claims::CanonicalWebhookEvent, WebhookError>) -> String {
    match result {
        Err(WebhookError::Validation { message, .. }) => message,
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// Signature
// ============================================================================

#[test]
fn test_signature_checked_before_parsing() {
    let result = normalizer().normalize(&InboundWebhook {
        payload: b"not json at all",
        signature: Some("00ff"),
        source: Some("payment-gateway"),
    });
    assert!(matches!(result, Err(WebhookError::Authentication(_))));
}

#[test]
fn test_body_signature_field_is_not_trusted() {
    let body = json!({
        "event": "claim.created",
        "timestamp": "2024-06-01T12:00:00Z",
        "signature": "anything",
        "data": { "claimId": "C1" }
    });
    let payload = serde_json::to_vec(&body).unwrap();
    let result = normalizer().normalize(&InboundWebhook {
        payload: &payload,
        signature: None,
        source: Some("payment-gateway"),
    });
    assert!(matches!(result, Err(WebhookError::Authentication(_))));
}

#[test]
fn test_unprovisioned_secret_rejects() {
    let payload = br#"{"event":"claim.created"}"#;
    let signature = sign_payload("", payload);
    let result = WebhookNormalizer::new(SignatureVerifier::unprovisioned()).normalize(&InboundWebhook {
        payload,
        signature: Some(&signature),
        source: Some("payment-gateway"),
    });
    assert!(matches!(result, Err(WebhookError::Authentication(_))));
}

// ============================================================================
// Shape Validation
// ============================================================================

#[test]
fn test_payment_issued_parsed() {
    let body = json!({
        "id": "evt-1",
        "event": "payment.issued",
        "timestamp": "2024-06-01T12:00:00+02:00",
        "data": { "claimId": "C1", "paymentId": "P1", "amount": 4200.5, "paidAt": "2024-06-01T09:00:00Z" }
    });
    let event = normalize(&body, "payment-gateway").unwrap();

    assert_eq!(event.kind, EventKind::PaymentIssued);
    assert_eq!(event.source, EventSource::PaymentGateway);
    assert_eq!(event.external_id.as_deref(), Some("evt-1"));
    assert_eq!(event.timestamp.to_rfc3339(), "2024-06-01T10:00:00+00:00");
    match event.payload {
        EventPayload::PaymentIssued(payment) => {
            assert_eq!(payment.claim_id.as_str(), "C1");
            assert_eq!(payment.amount, dec!(4200.5));
            assert!(payment.paid_at.is_some());
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn test_unknown_event_kind() {
    let body = json!({ "event": "claim.deleted", "timestamp": "2024-06-01T12:00:00Z", "data": {} });
    assert!(validation_message(normalize(&body, "payment-gateway")).contains("claim.deleted"));
}

#[test]
fn test_missing_source_tag() {
    let body = json!({ "event": "claim.created", "timestamp": "2024-06-01T12:00:00Z", "data": { "claimId": "C1" } });
    let payload = serde_json::to_vec(&body).unwrap();
    assert!(validation_message(normalize_raw(&payload, None)).contains("source"));
    assert!(validation_message(normalize_raw(&payload, Some("  "))).contains("source"));
}

#[test]
fn test_unrecognized_source_is_kept() {
    let body = json!({ "event": "claim.created", "timestamp": "2024-06-01T12:00:00Z", "data": { "claimId": "C1" } });
    let event = normalize(&body, "legacy-intake").unwrap();
    assert_eq!(event.source, EventSource::Unrecognized("legacy-intake".to_string()));
}

#[test]
fn test_bad_timestamp() {
    let body = json!({ "event": "claim.created", "timestamp": "yesterday", "data": { "claimId": "C1" } });
    assert!(validation_message(normalize(&body, "payment-gateway")).contains("timestamp"));
}

#[test]
fn test_non_object_body() {
    let payload = serde_json::to_vec(&json!([1, 2, 3])).unwrap();
    assert!(matches!(
        normalize_raw(&payload, Some("payment-gateway")),
        Err(WebhookError::Validation { claim_id: None, .. })
    ));
}

#[test]
fn test_string_amount_rejected_with_claim_hint() {
    let body = json!({
        "event": "payment.issued",
        "timestamp": "2024-06-01T12:00:00Z",
        "data": { "claimId": "C1", "paymentId": "P1", "amount": "4200" }
    });
    match normalize(&body, "payment-gateway") {
        Err(WebhookError::Validation { message, claim_id }) => {
            assert!(message.contains("amount"));
            assert_eq!(claim_id.unwrap().as_str(), "C1");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_negative_amount_rejected() {
    let body = json!({
        "event": "payment.issued",
        "timestamp": "2024-06-01T12:00:00Z",
        "data": { "claimId": "C1", "paymentId": "P1", "amount": -1 }
    });
    assert!(validation_message(normalize(&body, "payment-gateway")).contains("negative"));
}

#[test]
fn test_fraud_score_bounds() {
    let body = |score: f64| {
        json!({
            "event": "fraud.detected",
            "timestamp": "2024-06-01T12:00:00Z",
            "data": { "claimId": "C1", "score": score }
        })
    };
    assert!(normalize(&body(0.0), "fraud-service").is_ok());
    assert!(normalize(&body(1.0), "fraud-service").is_ok());
    assert!(validation_message(normalize(&body(1.01), "fraud-service")).contains("score"));
}

#[test]
fn test_indicators_must_be_strings() {
    let body = json!({
        "event": "fraud.detected",
        "timestamp": "2024-06-01T12:00:00Z",
        "data": { "claimId": "C1", "score": 0.5, "indicators": ["a", 1] }
    });
    assert!(validation_message(normalize(&body, "fraud-service")).contains("indicators"));
}

#[test]
fn test_document_without_claim() {
    let body = json!({
        "event": "document.uploaded",
        "timestamp": "2024-06-01T12:00:00Z",
        "data": { "documentId": "D1" }
    });
    let event = normalize(&body, "document-service").unwrap();
    assert!(event.claim_id().is_none());
    assert_eq!(event.subject(), "document:D1");
}

// ============================================================================
// Idempotency Keys
// ============================================================================

#[test]
fn test_idempotency_key_is_stable() {
    let body = json!({
        "id": "evt-9",
        "event": "fraud.detected",
        "timestamp": "2024-06-01T12:00:00Z",
        "data": { "claimId": "C1", "score": 0.4 }
    });
    let first = normalize(&body, "fraud-service").unwrap();
    let second = normalize(&body, "fraud-service").unwrap();
    assert_eq!(first.idempotency_key(), second.idempotency_key());
    assert_eq!(first.idempotency_key().len(), 64);

    let other_source = normalize(&body, "legacy-intake").unwrap();
    assert_ne!(first.idempotency_key(), other_source.idempotency_key());
}

#[test]
fn test_idempotency_key_without_id_uses_data() {
    let body = |score: f64| {
        json!({
            "event": "fraud.detected",
            "timestamp": "2024-06-01T12:00:00Z",
            "data": { "claimId": "C1", "score": score }
        })
    };
    let a = normalize(&body(0.4), "fraud-service").unwrap();
    let b = normalize(&body(0.5), "fraud-service").unwrap();
    assert_ne!(a.idempotency_key(), b.idempotency_key());
}
