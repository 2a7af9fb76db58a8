//! Unit tests for the Identifiers module
//!
//! Tests cover ledger identifiers (UUID-backed) and the intake-assigned
//! string keys used for claims and documents.

use core_kernel::identifiers::MAX_KEY_LEN;
use core_kernel::{AuditEntryId, ClaimId, DocumentId};
use proptest::prelude::*;
use uuid::Uuid;

mod audit_entry_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = AuditEntryId::new();
        let id2 = AuditEntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = AuditEntryId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = AuditEntryId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = AuditEntryId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_parse_without_prefix() {
        let uuid = Uuid::new_v4();
        let id: AuditEntryId = uuid.to_string().parse().unwrap();
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("AUD-not-a-uuid".parse::<AuditEntryId>().is_err());
    }

    #[test]
    fn test_prefix() {
        assert_eq!(AuditEntryId::prefix(), "AUD");
    }
}

mod key_tests {
    use super::*;

    #[test]
    fn test_claim_id_round_trips_through_json() {
        let id = ClaimId::parse("C1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"C1\"");
        let back: ClaimId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_claim_id_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<ClaimId>("\"\"").is_err());
    }

    #[test]
    fn test_document_id_rejects_control_characters() {
        assert!(DocumentId::parse("D\n1").is_err());
    }

    #[test]
    fn test_key_length_limit() {
        let at_limit = "x".repeat(MAX_KEY_LEN);
        let over_limit = "x".repeat(MAX_KEY_LEN + 1);
        assert!(ClaimId::parse(&at_limit).is_ok());
        assert!(ClaimId::parse(&over_limit).is_err());
    }

    proptest! {
        #[test]
        fn prop_parsed_keys_are_trimmed(key in "[A-Za-z0-9-]{1,32}", pad in 0usize..4) {
            let padded = format!("{}{}{}", " ".repeat(pad), key, " ".repeat(pad));
            let id = ClaimId::parse(&padded).unwrap();
            prop_assert_eq!(id.as_str(), key.as_str());
        }
    }
}
