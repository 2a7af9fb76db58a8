//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use core_kernel::PortError;
use domain_claims::{DispatchOutcome, WebhookError};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// Webhook failures use the sender-facing envelope
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Envelope returned to webhook senders
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DispatchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    pub fn processed(outcome: DispatchOutcome) -> Self {
        Self {
            success: true,
            processed: Some(true),
            result: Some(outcome),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            processed: None,
            result: None,
            error: Some(error.into()),
        }
    }
}

fn webhook_response(err: WebhookError) -> Response {
    let (status, body) = match err {
        WebhookError::Authentication(_) => (
            StatusCode::UNAUTHORIZED,
            WebhookResponse::failed("Invalid signature"),
        ),
        WebhookError::Validation { message, .. } => {
            (StatusCode::BAD_REQUEST, WebhookResponse::failed(message))
        }
        // The dispatcher settles these itself; anything reaching here changed nothing
        WebhookError::NotFound(_) | WebhookError::InvalidTransition(_) => (
            StatusCode::OK,
            WebhookResponse::processed(DispatchOutcome::ignored()),
        ),
        WebhookError::Storage(e) => {
            error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                WebhookResponse::failed("Webhook processing failed"),
            )
        }
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Webhook(err) => return webhook_response(err),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg),
            ApiError::Internal(msg) => {
                error!(message = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{} {} not found", entity_type, id))
            }
            PortError::Validation { message, .. } => ApiError::BadRequest(message),
            e if e.is_transient() => ApiError::Unavailable(e.to_string()),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_failures_are_server_errors() {
        let status = |e: WebhookError| ApiError::from(e).into_response().status();

        assert_eq!(status(WebhookError::authentication("bad mac")), StatusCode::UNAUTHORIZED);
        assert_eq!(status(WebhookError::validation("missing source")), StatusCode::BAD_REQUEST);
        assert_eq!(status(WebhookError::NotFound("C9".into())), StatusCode::OK);
        assert_eq!(
            status(WebhookError::Storage(PortError::internal("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_port_not_found_maps_to_404() {
        let err = ApiError::from(PortError::not_found("Claim", "C1"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
