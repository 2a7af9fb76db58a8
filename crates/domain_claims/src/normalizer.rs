//! Webhook event normalizer
//!
//! Turns a raw request (body plus the `signature-token` and `source-tag`
//! headers) into a [`CanonicalWebhookEvent`]. The signature is checked before
//! the body is parsed; every field a handler reads is validated against the
//! schema for its event kind. The normalizer has no side effects.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use core_kernel::{ClaimId, DocumentId};
use crate::error::WebhookError;
use crate::event::{
    CanonicalWebhookEvent, DocumentUploaded, EventKind, EventPayload, EventSource,
    FraudDetected, PaymentIssued,
};
use crate::signature::SignatureVerifier;

/// Header carrying the HMAC signature token
pub const SIGNATURE_HEADER: &str = "signature-token";
/// Header naming the sending system
pub const SOURCE_HEADER: &str = "source-tag";

/// A raw inbound webhook request
#[derive(Debug, Clone, Copy)]
pub struct InboundWebhook<'a> {
    pub payload: &'a [u8],
    pub signature: Option<&'a str>,
    pub source: Option<&'a str>,
}

/// Validates and canonicalizes inbound webhook requests
#[derive(Debug, Clone)]
pub struct WebhookNormalizer {
    verifier: SignatureVerifier,
}

impl WebhookNormalizer {
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self { verifier }
    }

    /// Normalizes one request
    ///
    /// # Errors
    ///
    /// - `WebhookError::Authentication` if the signature is missing or wrong
    /// - `WebhookError::Validation` if the source tag or body is malformed;
    ///   the error carries the claim id when the body names one
    pub fn normalize(&self, request: &InboundWebhook<'_>) -> Result<CanonicalWebhookEvent, WebhookError> {
        self.verifier.verify(request.payload, request.signature)?;
        // verify() rejects missing tokens, so this is always present here
        let signature = request.signature.unwrap_or_default().trim().to_string();

        let body: Value = serde_json::from_slice(request.payload)
            .map_err(|e| WebhookError::validation(format!("body is not valid JSON: {e}")))?;
        let body = body
            .as_object()
            .ok_or_else(|| WebhookError::validation("body must be a JSON object"))?;
        let claim_hint = claim_hint(body);

        parse_event(body, request.source, signature)
            .map_err(|message| WebhookError::validation(message).with_claim_id(claim_hint))
    }
}

fn parse_event(
    body: &Map<String, Value>,
    source: Option<&str>,
    signature: String,
) -> Result<CanonicalWebhookEvent, String> {
    let source = source
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(EventSource::from_tag)
        .ok_or("missing source tag")?;

    let kind = body
        .get("event")
        .and_then(Value::as_str)
        .ok_or("'event' must be a string")?
        .parse::<EventKind>()?;

    let timestamp = body
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or("'timestamp' must be an ISO-8601 string")
        .and_then(|raw| parse_timestamp(raw).ok_or("'timestamp' must be an ISO-8601 string"))?;

    let data = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or("'data' must be an object")?;

    let external_id = match body.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Some(_) => return Err("'id' must be a non-empty string".to_string()),
    };

    let payload = parse_payload(kind, data)?;

    Ok(CanonicalWebhookEvent {
        kind,
        timestamp,
        source,
        data: data.clone(),
        payload,
        external_id,
        signature,
    })
}

fn parse_payload(kind: EventKind, data: &Map<String, Value>) -> Result<EventPayload, String> {
    match kind {
        EventKind::PaymentIssued => Ok(EventPayload::PaymentIssued(PaymentIssued {
            claim_id: required_claim_id(data)?,
            payment_id: required_str(data, "paymentId")?.to_string(),
            amount: required_amount(data, "amount")?,
            paid_at: optional_timestamp(data, "paidAt")?,
        })),
        EventKind::FraudDetected => Ok(EventPayload::FraudDetected(FraudDetected {
            claim_id: required_claim_id(data)?,
            score: required_score(data, "score")?,
            indicators: optional_string_list(data, "indicators")?,
        })),
        EventKind::DocumentUploaded => Ok(EventPayload::DocumentUploaded(DocumentUploaded {
            document_id: DocumentId::parse(required_str(data, "documentId")?)
                .map_err(|e| e.to_string())?,
            claim_id: optional_claim_id(data)?,
            analysis: match data.get("analysis") {
                None | Some(Value::Null) => Map::new(),
                Some(Value::Object(analysis)) => analysis.clone(),
                Some(_) => return Err("'data.analysis' must be an object".to_string()),
            },
        })),
        EventKind::ClaimCreated
        | EventKind::ClaimUpdated
        | EventKind::ClaimApproved
        | EventKind::ClaimRejected
        | EventKind::ClaimPaid => Ok(EventPayload::ClaimLifecycle {
            claim_id: required_claim_id(data)?,
        }),
    }
}

/// Best-effort claim reference from an otherwise invalid body
fn claim_hint(body: &Map<String, Value>) -> Option<ClaimId> {
    body.get("data")
        .and_then(|data| data.get("claimId"))
        .and_then(Value::as_str)
        .and_then(|raw| ClaimId::parse(raw).ok())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn required_str<'a>(data: &'a Map<String, Value>, field: &str) -> Result<&'a str, String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("'data.{field}' must be a non-empty string"))
}

fn required_claim_id(data: &Map<String, Value>) -> Result<ClaimId, String> {
    ClaimId::parse(required_str(data, "claimId")?).map_err(|e| e.to_string())
}

fn optional_claim_id(data: &Map<String, Value>) -> Result<Option<ClaimId>, String> {
    match data.get("claimId") {
        None | Some(Value::Null) => Ok(None),
        Some(_) => required_claim_id(data).map(Some),
    }
}

fn required_amount(data: &Map<String, Value>, field: &str) -> Result<Decimal, String> {
    let number = data
        .get(field)
        .and_then(|v| match v {
            Value::Number(n) => Some(n),
            _ => None,
        })
        .ok_or_else(|| format!("'data.{field}' must be a number"))?;

    let text = number.to_string();
    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("'data.{field}' is out of range"))?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("'data.{field}' must not be negative"));
    }
    Ok(amount)
}

fn required_score(data: &Map<String, Value>, field: &str) -> Result<f64, String> {
    let score = data
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("'data.{field}' must be a number"))?;
    if !(0.0..=1.0).contains(&score) {
        return Err(format!("'data.{field}' must be between 0.0 and 1.0"));
    }
    Ok(score)
}

fn optional_timestamp(data: &Map<String, Value>, field: &str) -> Result<Option<DateTime<Utc>>, String> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| format!("'data.{field}' must be an ISO-8601 string")),
        Some(_) => Err(format!("'data.{field}' must be an ISO-8601 string")),
    }
}

fn optional_string_list(data: &Map<String, Value>, field: &str) -> Result<Vec<String>, String> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("'data.{field}' must contain only strings"))
            })
            .collect(),
        Some(_) => Err(format!("'data.{field}' must be an array of strings")),
    }
}
