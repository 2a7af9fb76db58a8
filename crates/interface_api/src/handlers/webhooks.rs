//! Webhook ingress handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use domain_claims::{InboundWebhook, SIGNATURE_HEADER, SOURCE_HEADER};

use crate::dto::webhooks::{ChallengeQuery, ChallengeResponse};
use crate::error::{ApiError, WebhookResponse};
use crate::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Receives a webhook delivery
///
/// The raw body is handed over untouched so the signature is checked against
/// the exact bytes the sender signed.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let request = InboundWebhook {
        payload: &body,
        signature: header(&headers, SIGNATURE_HEADER),
        source: header(&headers, SOURCE_HEADER),
    };

    let outcome = state.service.handle(request).await?;
    info!(
        action = outcome.action.as_str(),
        status = ?outcome.status,
        "Webhook processed"
    );
    Ok(Json(WebhookResponse::processed(outcome)))
}

/// Echoes a sender's verification challenge
pub async fn verify_endpoint(
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<ChallengeResponse>, ApiError> {
    match query.challenge {
        Some(challenge) if !challenge.is_empty() => Ok(Json(ChallengeResponse { challenge })),
        _ => Err(ApiError::BadRequest("Missing challenge".to_string())),
    }
}
