//! Custom Test Assertions
//!
//! Assertion helpers over audit trails and timelines with messages that show
//! the whole trail on failure.

use std::collections::HashSet;

use domain_claims::{AuditAction, AuditEntry, Claim, ClaimStatus, TimelineItem};

fn tags(entries: &[AuditEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.action.as_str()).collect()
}

/// Asserts the trail holds exactly `expected`, in order
pub fn assert_audit_actions(entries: &[AuditEntry], expected: &[AuditAction]) {
    let actual: Vec<&AuditAction> = entries.iter().map(|e| &e.action).collect();
    let expected: Vec<&AuditAction> = expected.iter().collect();
    assert_eq!(actual, expected, "Audit trail mismatch: {:?}", tags(entries));
}

/// Asserts `action` appears exactly `times` times
pub fn assert_action_count(entries: &[AuditEntry], action: &AuditAction, times: usize) {
    let count = entries.iter().filter(|e| &e.action == action).count();
    assert_eq!(
        count, times,
        "Expected {} x {}, found {} in {:?}",
        times, action, count, tags(entries)
    );
}

/// Asserts no idempotency key is carried by two committed entries
pub fn assert_unique_idempotency_keys(entries: &[AuditEntry]) {
    let mut seen = HashSet::new();
    for entry in entries.iter().filter(|e| e.is_committed()) {
        if let Some(key) = &entry.idempotency_key {
            assert!(seen.insert(key.as_str()), "Idempotency key {} committed twice", key);
        }
    }
}

/// Asserts timestamps never go backwards along the trail
pub fn assert_chronological(entries: &[AuditEntry]) {
    for pair in entries.windows(2) {
        assert!(
            (pair[0].timestamp, pair[0].sequence) <= (pair[1].timestamp, pair[1].sequence),
            "Entry {} ({}) is recorded after {} ({})",
            pair[0].sequence,
            pair[0].timestamp,
            pair[1].sequence,
            pair[1].timestamp
        );
    }
}

/// Asserts the timeline titles, in order
pub fn assert_timeline_titles(items: &[TimelineItem], expected: &[&str]) {
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, expected, "Timeline titles mismatch");
}

/// Asserts the reported status of a claim
pub fn assert_claim_status(claim: &Claim, expected: ClaimStatus) {
    assert_eq!(
        claim.status(),
        expected,
        "Claim {} is {} (lifecycle {}, fraud_flagged {})",
        claim.id,
        claim.status(),
        claim.lifecycle_status,
        claim.fraud_flagged
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ClaimFixtures;

    #[test]
    fn test_claim_status_assertion_accepts_override() {
        assert_claim_status(&ClaimFixtures::flagged("C1"), ClaimStatus::FlaggedFraud);
    }

    #[test]
    #[should_panic(expected = "Claim C1 is")]
    fn test_claim_status_assertion_reports_claim() {
        assert_claim_status(&ClaimFixtures::approved("C1"), ClaimStatus::Paid);
    }

    #[test]
    fn test_empty_trail_is_chronological() {
        assert_chronological(&[]);
        assert_unique_idempotency_keys(&[]);
    }
}
