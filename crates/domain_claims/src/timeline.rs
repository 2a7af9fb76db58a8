//! Timeline projection
//!
//! Read-side view of a claim's audit trail. [`project`] is a pure function of
//! the entries and the caller's notion of "now".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AuditEntryId, ClaimId, PortError};

use crate::audit::{AuditAction, AuditEntry};
use crate::ports::{collect_trail, AuditLedgerPort};

/// Display category of a timeline item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineCategory {
    Webhook,
    Payment,
    Fraud,
    Document,
    Status,
    Note,
    /// Actions this build does not know about
    General,
}

impl TimelineCategory {
    /// Derives the category from an audit action; total over all actions
    pub fn of(action: &AuditAction) -> Self {
        match action {
            AuditAction::WebhookReceived
            | AuditAction::WebhookRejected
            | AuditAction::WebhookSkipped => TimelineCategory::Webhook,
            AuditAction::PaymentConfirmed => TimelineCategory::Payment,
            AuditAction::FraudAlert | AuditAction::FraudScoreUpdated => TimelineCategory::Fraud,
            AuditAction::DocumentAnalyzed => TimelineCategory::Document,
            AuditAction::StatusChanged => TimelineCategory::Status,
            AuditAction::ClaimNote => TimelineCategory::Note,
            AuditAction::Other(_) => TimelineCategory::General,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TimelineCategory::Webhook => "inbox",
            TimelineCategory::Payment => "banknote",
            TimelineCategory::Fraud => "shield-alert",
            TimelineCategory::Document => "file-text",
            TimelineCategory::Status => "git-commit",
            TimelineCategory::Note => "message-square",
            TimelineCategory::General => "circle",
        }
    }
}

/// One display-ready timeline row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: AuditEntryId,
    pub category: TimelineCategory,
    pub icon: String,
    pub title: String,
    pub description: String,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    pub relative_time: String,
}

/// Projects entries into a timeline, oldest first
///
/// Uncommitted entries are left out.
pub fn project(entries: &[AuditEntry], now: DateTime<Utc>) -> Vec<TimelineItem> {
    let mut visible: Vec<&AuditEntry> = entries.iter().filter(|e| e.is_committed()).collect();
    visible.sort_by_key(|e| (e.timestamp, e.sequence));

    visible
        .into_iter()
        .map(|entry| {
            let category = TimelineCategory::of(&entry.action);
            TimelineItem {
                id: entry.id,
                category,
                icon: category.icon().to_string(),
                title: title(&entry.action),
                description: entry.description.clone(),
                actor: entry.actor.clone(),
                timestamp: entry.timestamp,
                relative_time: relative_time(entry.timestamp, now),
            }
        })
        .collect()
}

/// Loads a claim's committed trail and projects it
pub async fn project_claim(
    ledger: &dyn AuditLedgerPort,
    claim_id: &ClaimId,
    now: DateTime<Utc>,
) -> Result<Vec<TimelineItem>, PortError> {
    let entries = collect_trail(ledger, claim_id).await?;
    Ok(project(&entries, now))
}

/// Human-relative age of `at` as seen from `now`
///
/// Timestamps in the future read as "just now". Anything older than seven
/// days is shown as a calendar date.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(at);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        plural(minutes, "minute")
    } else if hours < 24 {
        plural(hours, "hour")
    } else if days <= 7 {
        plural(days, "day")
    } else {
        at.format("%b %-d, %Y").to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// "PAYMENT_CONFIRMED" -> "Payment Confirmed"
fn title(action: &AuditAction) -> String {
    action
        .as_str()
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_title_from_action() {
        assert_eq!(title(&AuditAction::PaymentConfirmed), "Payment Confirmed");
        assert_eq!(title(&AuditAction::Other("legacy_import".into())), "Legacy Import");
        assert_eq!(title(&AuditAction::Other(String::new())), "");
    }

    #[test]
    fn test_unknown_action_gets_generic_marker() {
        let category = TimelineCategory::of(&AuditAction::from_tag("SOMETHING_NEW"));
        assert_eq!(category, TimelineCategory::General);
        assert_eq!(category.icon(), "circle");
    }

    #[test]
    fn test_absolute_date_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        assert_eq!(relative_time(at, now), "Mar 5, 2024");
    }
}
