//! Audit ledger records
//!
//! Entries are write-once. The only field the ledger advances after an append
//! is [`CommitState`], and only out of `Pending`. Readers see committed entries
//! exclusively, so an entry describing a mutation never becomes visible before
//! the mutation itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AuditEntryId, ClaimId, CoreError};
use crate::claim::Claim;
use crate::document::Document;

/// Structured details attached to an entry
pub type AuditDetails = Map<String, Value>;

/// Category tag of an audit entry
///
/// Tags persisted by other writers that this build does not know are kept
/// verbatim in [`AuditAction::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditAction {
    WebhookReceived,
    WebhookRejected,
    WebhookSkipped,
    PaymentConfirmed,
    FraudAlert,
    FraudScoreUpdated,
    DocumentAnalyzed,
    ClaimNote,
    StatusChanged,
    Other(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::WebhookReceived => "WEBHOOK_RECEIVED",
            AuditAction::WebhookRejected => "WEBHOOK_REJECTED",
            AuditAction::WebhookSkipped => "WEBHOOK_SKIPPED",
            AuditAction::PaymentConfirmed => "PAYMENT_CONFIRMED",
            AuditAction::FraudAlert => "FRAUD_ALERT",
            AuditAction::FraudScoreUpdated => "FRAUD_SCORE_UPDATED",
            AuditAction::DocumentAnalyzed => "DOCUMENT_ANALYZED",
            AuditAction::ClaimNote => "CLAIM_NOTE",
            AuditAction::StatusChanged => "STATUS_CHANGED",
            AuditAction::Other(tag) => tag,
        }
    }

    /// Maps a persisted tag back to an action; never fails
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "WEBHOOK_RECEIVED" => AuditAction::WebhookReceived,
            "WEBHOOK_REJECTED" => AuditAction::WebhookRejected,
            "WEBHOOK_SKIPPED" => AuditAction::WebhookSkipped,
            "PAYMENT_CONFIRMED" => AuditAction::PaymentConfirmed,
            "FRAUD_ALERT" => AuditAction::FraudAlert,
            "FRAUD_SCORE_UPDATED" => AuditAction::FraudScoreUpdated,
            "DOCUMENT_ANALYZED" => AuditAction::DocumentAnalyzed,
            "CLAIM_NOTE" => AuditAction::ClaimNote,
            "STATUS_CHANGED" => AuditAction::StatusChanged,
            other => AuditAction::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for AuditAction {
    fn from(tag: String) -> Self {
        AuditAction::from_tag(&tag)
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> String {
        action.as_str().to_string()
    }
}

/// Commit state of an entry within the pending/commit protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    /// Appended ahead of the mutation it describes
    Pending,
    /// Visible to readers
    Committed,
    /// Its mutation was never applied, or was rolled back
    Discarded,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Committed => "committed",
            CommitState::Discarded => "discarded",
        }
    }
}

impl FromStr for CommitState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommitState::Pending),
            "committed" => Ok(CommitState::Committed),
            "discarded" => Ok(CommitState::Discarded),
            other => Err(CoreError::validation(format!("unknown commit state '{}'", other))),
        }
    }
}

/// What the recovery sweep needs to undo a pending mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum Compensation {
    Claim { prior: Box<Claim> },
    Document { prior: Box<Document> },
}

/// An entry to be appended to the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub claim_id: Option<ClaimId>,
    pub action: AuditAction,
    pub actor: String,
    pub description: String,
    pub details: AuditDetails,
    pub idempotency_key: Option<String>,
    pub compensation: Option<Compensation>,
}

impl NewAuditEntry {
    /// Creates a system-wide entry with no details
    pub fn new(action: AuditAction, actor: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            claim_id: None,
            action,
            actor: actor.into(),
            description: description.into(),
            details: AuditDetails::new(),
            idempotency_key: None,
            compensation: None,
        }
    }

    /// Scopes the entry to a claim
    pub fn for_claim(mut self, claim_id: Option<ClaimId>) -> Self {
        self.claim_id = claim_id;
        self
    }

    /// Adds one structured detail
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Tags the entry with the idempotency key of the event that caused it
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Attaches the data needed to roll the mutation back
    pub fn with_compensation(mut self, compensation: Compensation) -> Self {
        self.compensation = Some(compensation);
        self
    }
}

/// A durable ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    /// Ledger-wide append order
    pub sequence: i64,
    pub claim_id: Option<ClaimId>,
    pub action: AuditAction,
    pub actor: String,
    pub description: String,
    pub details: AuditDetails,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub state: CommitState,
    #[serde(skip)]
    pub compensation: Option<Compensation>,
}

impl AuditEntry {
    /// Materializes an appended entry
    pub fn from_new(
        entry: NewAuditEntry,
        id: AuditEntryId,
        sequence: i64,
        timestamp: DateTime<Utc>,
        state: CommitState,
    ) -> Self {
        Self {
            id,
            sequence,
            claim_id: entry.claim_id,
            action: entry.action,
            actor: entry.actor,
            description: entry.description,
            details: entry.details,
            timestamp,
            idempotency_key: entry.idempotency_key,
            state,
            compensation: entry.compensation,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == CommitState::Committed
    }

    /// Reads a detail as a string
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_round_trips() {
        let action = AuditAction::from_tag("LEGACY_IMPORT");
        assert_eq!(action, AuditAction::Other("LEGACY_IMPORT".to_string()));
        assert_eq!(action.as_str(), "LEGACY_IMPORT");
    }

    #[test]
    fn test_action_serializes_as_tag() {
        let json = serde_json::to_string(&AuditAction::PaymentConfirmed).unwrap();
        assert_eq!(json, "\"PAYMENT_CONFIRMED\"");
    }

    #[test]
    fn test_builder_collects_details() {
        let entry = NewAuditEntry::new(AuditAction::ClaimNote, "user-1", "note")
            .with_detail("amount", 4200)
            .with_idempotency_key("k");
        assert_eq!(entry.details["amount"], serde_json::json!(4200));
        assert_eq!(entry.idempotency_key.as_deref(), Some("k"));
    }
}
