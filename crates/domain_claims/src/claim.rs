//! Claim aggregate and status lifecycle
//!
//! ```text
//! SUBMITTED -> UNDER_REVIEW -> INVESTIGATING -> APPROVED -> PAID -> CLOSED
//!      \____________\_______________\______________\
//!                                                   -> REJECTED
//! ```
//!
//! Transitions only move forward. `CLOSED` and `REJECTED` are terminal.
//! `FLAGGED_FRAUD` is not a lifecycle stage: it overrides the reported status
//! while the fraud flag is set and leaves the lifecycle status untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AuditEntryId, ClaimId, CoreError};
use crate::error::ClaimError;

/// Fraud scores strictly above this value flag the claim
pub const FRAUD_THRESHOLD: f64 = 0.8;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    /// Received from intake
    Submitted,
    /// Assigned to an adjuster
    UnderReview,
    /// Referred for investigation
    Investigating,
    /// Approved for payment
    Approved,
    /// Payment issued
    Paid,
    /// Closed
    Closed,
    /// Rejected
    Rejected,
    /// Reported while the fraud flag is set
    FlaggedFraud,
}

impl ClaimStatus {
    /// Every status, in lifecycle order followed by the side branches
    pub const ALL: [ClaimStatus; 8] = [
        ClaimStatus::Submitted,
        ClaimStatus::UnderReview,
        ClaimStatus::Investigating,
        ClaimStatus::Approved,
        ClaimStatus::Paid,
        ClaimStatus::Closed,
        ClaimStatus::Rejected,
        ClaimStatus::FlaggedFraud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "SUBMITTED",
            ClaimStatus::UnderReview => "UNDER_REVIEW",
            ClaimStatus::Investigating => "INVESTIGATING",
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Paid => "PAID",
            ClaimStatus::Closed => "CLOSED",
            ClaimStatus::Rejected => "REJECTED",
            ClaimStatus::FlaggedFraud => "FLAGGED_FRAUD",
        }
    }

    /// Returns true if no further transition is permitted
    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Closed | ClaimStatus::Rejected)
    }

    /// Position on the main lifecycle path; side branches have none
    fn rank(&self) -> Option<u8> {
        match self {
            ClaimStatus::Submitted => Some(0),
            ClaimStatus::UnderReview => Some(1),
            ClaimStatus::Investigating => Some(2),
            ClaimStatus::Approved => Some(3),
            ClaimStatus::Paid => Some(4),
            ClaimStatus::Closed => Some(5),
            ClaimStatus::Rejected | ClaimStatus::FlaggedFraud => None,
        }
    }

    /// Checks whether the lifecycle permits moving from `self` to `target`
    pub fn can_transition_to(&self, target: ClaimStatus) -> bool {
        use ClaimStatus::*;

        if self.is_terminal() {
            return false;
        }
        match (self.rank(), target) {
            (_, FlaggedFraud) | (None, _) => false,
            (Some(from), Rejected) => Paid.rank().is_some_and(|paid| from < paid),
            (Some(from), to) => to.rank().is_some_and(|to| to > from),
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::validation(format!("unknown claim status '{}'", s)))
    }
}

/// A claim as held by the claim state store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Identifier assigned at intake
    pub id: ClaimId,
    /// Substantive lifecycle status
    pub lifecycle_status: ClaimStatus,
    /// Set once a fraud score exceeds [`FRAUD_THRESHOLD`]
    pub fraud_flagged: bool,
    /// Latest fraud score (0.0 - 1.0)
    pub fraud_score: Option<f64>,
    /// Indicators reported with the latest fraud score
    pub fraud_indicators: Vec<String>,
    /// Payment reference from the gateway
    pub payment_id: Option<String>,
    /// Amount paid
    pub payment_amount: Option<Decimal>,
    /// When the payment was issued
    pub paid_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version, bumped by the store on every write
    pub version: i64,
    /// Audit entry whose unit of work wrote this version
    #[serde(default)]
    pub last_entry_id: Option<AuditEntryId>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Creates a claim at the start of its lifecycle
    pub fn submitted(id: ClaimId) -> Self {
        Self::with_status(id, ClaimStatus::Submitted)
    }

    /// Creates a claim already at the given lifecycle status
    ///
    /// Intake and administrative tooling seed claims through this constructor.
    pub fn with_status(id: ClaimId, status: ClaimStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            lifecycle_status: status,
            fraud_flagged: false,
            fraud_score: None,
            fraud_indicators: Vec::new(),
            payment_id: None,
            payment_amount: None,
            paid_at: None,
            version: 0,
            last_entry_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Status as reported to callers, with the fraud override applied
    pub fn status(&self) -> ClaimStatus {
        if self.fraud_flagged {
            ClaimStatus::FlaggedFraud
        } else {
            self.lifecycle_status
        }
    }

    /// Returns true if the lifecycle has ended
    pub fn is_terminal(&self) -> bool {
        self.lifecycle_status.is_terminal()
    }

    /// Moves the lifecycle status forward
    pub fn transition_to(&mut self, target: ClaimStatus, at: DateTime<Utc>) -> Result<(), ClaimError> {
        self.ensure_mutable()?;
        if !self.lifecycle_status.can_transition_to(target) {
            return Err(ClaimError::InvalidStatusTransition {
                from: self.lifecycle_status.to_string(),
                to: target.to_string(),
            });
        }
        self.lifecycle_status = target;
        self.updated_at = at;
        Ok(())
    }

    /// Records an issued payment and moves the claim to `PAID`
    ///
    /// The gateway reports money that has already moved, so a fraud flag does
    /// not block this. The flag stays set and keeps overriding the reported
    /// status.
    pub fn record_payment(
        &mut self,
        payment_id: impl Into<String>,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<(), ClaimError> {
        self.transition_to(ClaimStatus::Paid, paid_at)?;
        self.payment_id = Some(payment_id.into());
        self.payment_amount = Some(amount);
        self.paid_at = Some(paid_at);
        Ok(())
    }

    /// Stores a fraud assessment
    ///
    /// Returns true if the score exceeded [`FRAUD_THRESHOLD`]. The flag is never
    /// cleared by a later, lower score.
    pub fn record_fraud_assessment(
        &mut self,
        score: f64,
        indicators: Vec<String>,
        at: DateTime<Utc>,
    ) -> Result<bool, ClaimError> {
        self.ensure_mutable()?;
        if !(0.0..=1.0).contains(&score) {
            return Err(ClaimError::InvalidFraudScore(score));
        }
        let exceeds = score > FRAUD_THRESHOLD;
        self.fraud_score = Some(score);
        self.fraud_indicators = indicators;
        self.fraud_flagged |= exceeds;
        self.updated_at = at;
        Ok(exceeds)
    }

    fn ensure_mutable(&self) -> Result<(), ClaimError> {
        if self.is_terminal() {
            return Err(ClaimError::TerminalState {
                claim_id: self.id.to_string(),
                status: self.lifecycle_status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(status: ClaimStatus) -> Claim {
        Claim::with_status(ClaimId::parse("C1").unwrap(), status)
    }

    #[test]
    fn test_rejected_only_before_payment() {
        assert!(ClaimStatus::Investigating.can_transition_to(ClaimStatus::Rejected));
        assert!(!ClaimStatus::Paid.can_transition_to(ClaimStatus::Rejected));
    }

    #[test]
    fn test_no_transition_out_of_rejected() {
        for target in ClaimStatus::ALL {
            assert!(!ClaimStatus::Rejected.can_transition_to(target));
        }
    }

    #[test]
    fn test_fraud_flag_overrides_reported_status() {
        let mut claim = claim(ClaimStatus::UnderReview);
        assert!(claim.record_fraud_assessment(0.95, vec![], Utc::now()).unwrap());
        assert_eq!(claim.status(), ClaimStatus::FlaggedFraud);
        assert_eq!(claim.lifecycle_status, ClaimStatus::UnderReview);
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("under_review".parse::<ClaimStatus>().unwrap(), ClaimStatus::UnderReview);
        assert!("ARCHIVED".parse::<ClaimStatus>().is_err());
    }
}
