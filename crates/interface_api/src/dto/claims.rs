//! Claims DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use domain_claims::{AuditEntry, Claim, ClaimStatus, TimelineItem};

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claim_id: String,
    /// Reported status, `FLAGGED_FRAUD` while the fraud flag is set
    pub status: ClaimStatus,
    pub lifecycle_status: ClaimStatus,
    pub fraud_flagged: bool,
    pub fraud_score: Option<f64>,
    pub fraud_indicators: Vec<String>,
    pub payment_id: Option<String>,
    pub payment_amount: Option<Decimal>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Claim> for ClaimResponse {
    fn from(claim: Claim) -> Self {
        Self {
            claim_id: claim.id.to_string(),
            status: claim.status(),
            lifecycle_status: claim.lifecycle_status,
            fraud_flagged: claim.fraud_flagged,
            fraud_score: claim.fraud_score,
            fraud_indicators: claim.fraud_indicators,
            payment_id: claim.payment_id,
            payment_amount: claim.payment_amount,
            paid_at: claim.paid_at,
            version: claim.version,
            updated_at: claim.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditTrailResponse {
    pub claim_id: String,
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Serialize)]
pub struct TimelineResponse {
    pub claim_id: String,
    pub items: Vec<TimelineItem>,
}
