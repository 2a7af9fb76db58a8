//! Property-Based Test Generators
//!
//! Proptest strategies for claims, fraud scores, and webhook payloads.

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use core_kernel::ClaimId;
use domain_claims::{ClaimStatus, EventKind};

/// Strategy for any claim status, including the fraud override
pub fn claim_status_strategy() -> impl Strategy<Value = ClaimStatus> {
    proptest::sample::select(ClaimStatus::ALL.to_vec())
}

/// Strategy for statuses a claim can hold in storage
pub fn lifecycle_status_strategy() -> impl Strategy<Value = ClaimStatus> {
    claim_status_strategy().prop_filter("fraud is an override, not a lifecycle status", |s| {
        *s != ClaimStatus::FlaggedFraud
    })
}

/// Strategy for valid fraud scores in 0.0..=1.0, weighted around the threshold
pub fn fraud_score_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        0.0f64..=1.0f64,
        Just(0.8),
        Just(0.81),
        (790u32..=820u32).prop_map(|n| f64::from(n) / 1000.0),
    ]
}

/// Strategy for payment amounts with two decimal places
pub fn payment_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for claim ids like `CLM-004211`
pub fn claim_id_strategy() -> impl Strategy<Value = ClaimId> {
    (0u32..1_000_000u32).prop_map(|n| ClaimId::parse(format!("CLM-{:06}", n)).unwrap())
}

/// Strategy for event kinds
pub fn event_kind_strategy() -> impl Strategy<Value = EventKind> {
    proptest::sample::select(vec![
        EventKind::ClaimCreated,
        EventKind::ClaimUpdated,
        EventKind::ClaimApproved,
        EventKind::ClaimRejected,
        EventKind::ClaimPaid,
        EventKind::DocumentUploaded,
        EventKind::FraudDetected,
        EventKind::PaymentIssued,
    ])
}

/// Strategy for source tags, mixing known senders with unknown ones
pub fn source_tag_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("payment-gateway".to_string()),
        Just("fraud-service".to_string()),
        Just("document-service".to_string()),
        "[a-z]{3,12}(-[a-z]{3,8})?",
    ]
}

/// Strategy for arbitrary JSON values up to a small depth
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..4)
                .prop_map(|m| json!(m)),
        ]
    })
}
