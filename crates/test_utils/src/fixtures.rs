//! Pre-built Test Fixtures
//!
//! Ready-to-use claims, documents, and timestamps. Fixtures are fixed so
//! assertions can compare against literal values.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{ClaimId, DocumentId};
use domain_claims::{Claim, ClaimStatus, Document};
use rust_decimal_macros::dec;

/// Shared secret the fixtures sign webhooks with
pub const WEBHOOK_SECRET: &str = "whsec_test_fixture";

/// JWT secret used by API fixtures
pub const JWT_SECRET: &str = "jwt_test_fixture";

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    pub fn claim(id: &str) -> ClaimId {
        ClaimId::parse(id).unwrap()
    }

    pub fn document(id: &str) -> DocumentId {
        DocumentId::parse(id).unwrap()
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Timestamp the webhook fixtures carry (Jun 1, 2024 noon UTC)
    pub fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    /// RFC 3339 form of [`Self::event_time`]
    pub fn event_time_rfc3339() -> &'static str {
        "2024-06-01T12:00:00Z"
    }

    /// A fixed "now" for timeline projections
    pub fn projection_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
    }
}

/// Fixture for claims in each interesting state
pub struct ClaimFixtures;

impl ClaimFixtures {
    /// An approved claim, ready to be paid
    pub fn approved(id: &str) -> Claim {
        Claim::with_status(IdFixtures::claim(id), ClaimStatus::Approved)
    }

    pub fn submitted(id: &str) -> Claim {
        Claim::submitted(IdFixtures::claim(id))
    }

    /// A claim that has reached a terminal status
    pub fn closed(id: &str) -> Claim {
        Claim::with_status(IdFixtures::claim(id), ClaimStatus::Closed)
    }

    /// An approved claim already carrying the fraud flag
    pub fn flagged(id: &str) -> Claim {
        let mut claim = Self::approved(id);
        claim
            .record_fraud_assessment(0.95, vec!["staged_collision".into()], TemporalFixtures::event_time())
            .unwrap();
        claim
    }

    /// A claim paid through the gateway
    pub fn paid(id: &str) -> Claim {
        let mut claim = Self::approved(id);
        claim
            .record_payment("P-FIXTURE", dec!(1250.00), TemporalFixtures::event_time())
            .unwrap();
        claim
    }
}

/// Fixture for documents
pub struct DocumentFixtures;

impl DocumentFixtures {
    /// An unanalyzed document attached to `claim`
    pub fn attached(id: &str, claim: &str) -> Document {
        Document::new(IdFixtures::document(id), Some(IdFixtures::claim(claim)))
    }
}
