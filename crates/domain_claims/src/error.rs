//! Claims domain errors

use thiserror::Error;

use core_kernel::{ClaimId, PortError};

/// Errors raised by the claim state machine
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Claim not found: {0}")]
    ClaimNotFound(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Claim {claim_id} is in terminal state {status}")]
    TerminalState { claim_id: String, status: String },

    #[error("Fraud score {0} is outside 0.0..=1.0")]
    InvalidFraudScore(f64),
}

impl ClaimError {
    /// Returns true for errors that mean the target entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClaimError::ClaimNotFound(_) | ClaimError::DocumentNotFound(_))
    }
}

/// Errors surfaced by webhook ingestion
///
/// Authentication and validation failures are raised before any state is
/// touched. `NotFound` and `InvalidTransition` are business-rule failures the
/// dispatcher records and reports as ignored. `Storage` is the only class that
/// aborts a unit of work and is safe for the sender to retry verbatim.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        /// Claim id recovered from the payload, if any
        claim_id: Option<ClaimId>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] PortError),
}

impl WebhookError {
    pub fn authentication(message: impl Into<String>) -> Self {
        WebhookError::Authentication(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WebhookError::Validation {
            message: message.into(),
            claim_id: None,
        }
    }

    /// Attaches the claim id a rejected payload referred to
    pub fn with_claim_id(self, id: Option<ClaimId>) -> Self {
        match self {
            WebhookError::Validation { message, .. } => WebhookError::Validation {
                message,
                claim_id: id,
            },
            other => other,
        }
    }

    /// Returns true when the sender may retry the identical request
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Storage(_))
    }
}

impl From<ClaimError> for WebhookError {
    fn from(err: ClaimError) -> Self {
        if err.is_not_found() {
            WebhookError::NotFound(err.to_string())
        } else {
            WebhookError::InvalidTransition(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_error_maps_to_webhook_taxonomy() {
        let missing: WebhookError = ClaimError::ClaimNotFound("C1".into()).into();
        assert!(matches!(missing, WebhookError::NotFound(_)));

        let terminal: WebhookError = ClaimError::TerminalState {
            claim_id: "C1".into(),
            status: "CLOSED".into(),
        }
        .into();
        assert!(matches!(terminal, WebhookError::InvalidTransition(_)));
    }

    #[test]
    fn test_only_storage_is_retryable() {
        assert!(WebhookError::Storage(PortError::connection("down")).is_retryable());
        assert!(!WebhookError::validation("bad").is_retryable());
        assert!(!WebhookError::authentication("bad").is_retryable());
    }
}
