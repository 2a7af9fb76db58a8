//! Claim lifecycle tests

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal_macros::dec;

use core_kernel::ClaimId;

use domain_claims::claim::{Claim, ClaimStatus, FRAUD_THRESHOLD};
use domain_claims::error::ClaimError;

fn claim_at(status: ClaimStatus) -> Claim {
    Claim::with_status(ClaimId::parse("C1").unwrap(), status)
}

// ============================================================================
// Transition Rules
// ============================================================================

mod transition_tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        let mut claim = claim_at(ClaimStatus::Submitted);
        for target in [
            ClaimStatus::UnderReview,
            ClaimStatus::Investigating,
            ClaimStatus::Approved,
            ClaimStatus::Paid,
            ClaimStatus::Closed,
        ] {
            claim.transition_to(target, Utc::now()).unwrap();
            assert_eq!(claim.status(), target);
        }
        assert!(claim.is_terminal());
    }

    #[test]
    fn test_skipping_stages_is_allowed() {
        let mut claim = claim_at(ClaimStatus::Submitted);
        assert!(claim.transition_to(ClaimStatus::Approved, Utc::now()).is_ok());
    }

    #[test]
    fn test_backward_move_rejected() {
        let mut claim = claim_at(ClaimStatus::Approved);
        let err = claim.transition_to(ClaimStatus::UnderReview, Utc::now()).unwrap_err();
        assert!(matches!(err, ClaimError::InvalidStatusTransition { .. }));
        assert_eq!(claim.status(), ClaimStatus::Approved);
    }

    #[test]
    fn test_same_status_rejected() {
        let mut claim = claim_at(ClaimStatus::UnderReview);
        assert!(claim.transition_to(ClaimStatus::UnderReview, Utc::now()).is_err());
    }

    #[test]
    fn test_rejection_before_payment() {
        for from in [
            ClaimStatus::Submitted,
            ClaimStatus::UnderReview,
            ClaimStatus::Investigating,
            ClaimStatus::Approved,
        ] {
            let mut claim = claim_at(from);
            assert!(claim.transition_to(ClaimStatus::Rejected, Utc::now()).is_ok());
            assert!(claim.is_terminal());
        }
        assert!(claim_at(ClaimStatus::Paid)
            .transition_to(ClaimStatus::Rejected, Utc::now())
            .is_err());
    }

    #[test]
    fn test_terminal_claims_are_frozen() {
        for status in [ClaimStatus::Closed, ClaimStatus::Rejected] {
            let mut claim = claim_at(status);
            let err = claim.record_fraud_assessment(0.9, vec![], Utc::now()).unwrap_err();
            assert!(matches!(err, ClaimError::TerminalState { .. }));
            assert!(!claim.fraud_flagged);
        }
    }

    #[test]
    fn test_flagged_fraud_is_not_a_transition_target() {
        for from in ClaimStatus::ALL {
            assert!(!from.can_transition_to(ClaimStatus::FlaggedFraud));
        }
    }
}

// ============================================================================
// Payment and Fraud
// ============================================================================

mod payment_and_fraud_tests {
    use super::*;

    #[test]
    fn test_record_payment() {
        let mut claim = claim_at(ClaimStatus::Approved);
        let paid_at = Utc::now();
        claim.record_payment("P1", dec!(4200), paid_at).unwrap();

        assert_eq!(claim.status(), ClaimStatus::Paid);
        assert_eq!(claim.payment_id.as_deref(), Some("P1"));
        assert_eq!(claim.payment_amount, Some(dec!(4200)));
        assert_eq!(claim.paid_at, Some(paid_at));
    }

    #[test]
    fn test_payment_on_closed_claim_rejected() {
        let mut claim = claim_at(ClaimStatus::Closed);
        assert!(claim.record_payment("P1", dec!(10), Utc::now()).is_err());
        assert!(claim.payment_id.is_none());
    }

    #[test]
    fn test_flagged_claim_payment_keeps_flag() {
        let mut claim = claim_at(ClaimStatus::Approved);
        claim.record_fraud_assessment(0.95, vec!["velocity".into()], Utc::now()).unwrap();

        claim.record_payment("P1", dec!(10), Utc::now()).unwrap();

        assert_eq!(claim.lifecycle_status, ClaimStatus::Paid);
        assert!(claim.fraud_flagged);
        assert_eq!(claim.status(), ClaimStatus::FlaggedFraud);
        assert_eq!(claim.payment_id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut claim = claim_at(ClaimStatus::UnderReview);
        assert!(!claim.record_fraud_assessment(FRAUD_THRESHOLD, vec![], Utc::now()).unwrap());
        assert!(!claim.fraud_flagged);
        assert_eq!(claim.fraud_score, Some(0.8));

        assert!(claim.record_fraud_assessment(0.81, vec![], Utc::now()).unwrap());
        assert_eq!(claim.status(), ClaimStatus::FlaggedFraud);
    }

    #[test]
    fn test_flag_survives_lower_score() {
        let mut claim = claim_at(ClaimStatus::UnderReview);
        claim.record_fraud_assessment(0.9, vec![], Utc::now()).unwrap();
        claim.record_fraud_assessment(0.1, vec![], Utc::now()).unwrap();

        assert!(claim.fraud_flagged);
        assert_eq!(claim.fraud_score, Some(0.1));
    }

    #[test]
    fn test_score_out_of_range() {
        let mut claim = claim_at(ClaimStatus::UnderReview);
        assert!(matches!(
            claim.record_fraud_assessment(1.5, vec![], Utc::now()),
            Err(ClaimError::InvalidFraudScore(_))
        ));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn any_status() -> impl Strategy<Value = ClaimStatus> {
    prop::sample::select(ClaimStatus::ALL.to_vec())
}

fn lifecycle_rank(status: ClaimStatus) -> u8 {
    match status {
        ClaimStatus::Submitted => 0,
        ClaimStatus::UnderReview => 1,
        ClaimStatus::Investigating => 2,
        ClaimStatus::Approved => 3,
        ClaimStatus::Paid => 4,
        ClaimStatus::Closed | ClaimStatus::Rejected => 5,
        ClaimStatus::FlaggedFraud => unreachable!("not a lifecycle status"),
    }
}

proptest! {
    #[test]
    fn prop_status_never_moves_backwards(targets in prop::collection::vec(any_status(), 0..30)) {
        let mut claim = claim_at(ClaimStatus::Submitted);
        for target in targets {
            let before = claim.lifecycle_status;
            let _ = claim.transition_to(target, Utc::now());
            prop_assert!(lifecycle_rank(claim.lifecycle_status) >= lifecycle_rank(before));
            if before.is_terminal() {
                prop_assert_eq!(claim.lifecycle_status, before);
            }
        }
    }

    #[test]
    fn prop_fraud_flag_matches_max_score(scores in prop::collection::vec(0.0f64..=1.0, 1..20)) {
        let mut claim = claim_at(ClaimStatus::UnderReview);
        for score in &scores {
            claim.record_fraud_assessment(*score, vec![], Utc::now()).unwrap();
        }
        let expected = scores.iter().any(|s| *s > FRAUD_THRESHOLD);
        prop_assert_eq!(claim.fraud_flagged, expected);
    }
}
