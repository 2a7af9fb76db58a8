//! Timeline projection tests

use chrono::{DateTime, Duration, TimeZone, Utc};

use core_kernel::{AuditEntryId, ClaimId};

use domain_claims::audit::{AuditAction, AuditEntry, CommitState, NewAuditEntry};
use domain_claims::timeline::{project, relative_time, TimelineCategory};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn entry(action: AuditAction, sequence: i64, timestamp: DateTime<Utc>, state: CommitState) -> AuditEntry {
    let new = NewAuditEntry::new(action, "tester", "description")
        .for_claim(Some(ClaimId::parse("C1").unwrap()));
    AuditEntry::from_new(new, AuditEntryId::new_v7(), sequence, timestamp, state)
}

// ============================================================================
// Relative Time
// ============================================================================

#[test]
fn test_relative_time_buckets() {
    let cases = [
        (Duration::seconds(0), "just now"),
        (Duration::seconds(59), "just now"),
        (Duration::minutes(1), "1 minute ago"),
        (Duration::minutes(59), "59 minutes ago"),
        (Duration::minutes(60), "1 hour ago"),
        (Duration::hours(23), "23 hours ago"),
        (Duration::hours(24), "1 day ago"),
        (Duration::days(7), "7 days ago"),
        (Duration::days(8), "Jun 7, 2024"),
    ];
    for (ago, expected) in cases {
        assert_eq!(relative_time(now() - ago, now()), expected, "{ago:?} ago");
    }
}

#[test]
fn test_future_timestamp_is_just_now() {
    assert_eq!(relative_time(now() + Duration::hours(3), now()), "just now");
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn test_projection_orders_and_filters() {
    let entries = vec![
        entry(AuditAction::PaymentConfirmed, 3, now() - Duration::minutes(5), CommitState::Committed),
        entry(AuditAction::WebhookReceived, 2, now() - Duration::minutes(5), CommitState::Committed),
        entry(AuditAction::FraudAlert, 1, now() - Duration::days(2), CommitState::Committed),
        entry(AuditAction::StatusChanged, 4, now(), CommitState::Pending),
        entry(AuditAction::StatusChanged, 5, now(), CommitState::Discarded),
    ];

    let timeline = project(&entries, now());

    let categories: Vec<_> = timeline.iter().map(|item| item.category).collect();
    assert_eq!(
        categories,
        vec![TimelineCategory::Fraud, TimelineCategory::Webhook, TimelineCategory::Payment]
    );
    assert_eq!(timeline[0].relative_time, "2 days ago");
    assert_eq!(timeline[2].relative_time, "5 minutes ago");
    assert_eq!(timeline[2].icon, "banknote");
}

#[test]
fn test_projection_tolerates_unknown_actions() {
    let entries = vec![entry(AuditAction::from_tag("ARCHIVED_BY_OPS"), 1, now(), CommitState::Committed)];
    let timeline = project(&entries, now());

    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].category, TimelineCategory::General);
    assert_eq!(timeline[0].title, "Archived By Ops");
}

#[test]
fn test_projection_is_pure() {
    let entries = vec![entry(AuditAction::ClaimNote, 1, now() - Duration::hours(2), CommitState::Committed)];
    let first = project(&entries, now());
    let second = project(&entries, now());
    assert_eq!(first, second);
    assert_eq!(entries[0].state, CommitState::Committed);
}
