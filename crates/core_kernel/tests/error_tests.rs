//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::ClaimId;

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");

    match error {
        CoreError::Validation(msg) => assert_eq!(msg, "Invalid input"),
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_core_error_invalid_state() {
    let error = CoreError::invalid_state("Cannot transition from CLOSED to PAID");

    match error {
        CoreError::InvalidStateTransition(msg) => assert!(msg.contains("Cannot transition")),
        _ => panic!("Expected InvalidStateTransition error"),
    }
}

#[test]
fn test_core_error_not_found() {
    let error = CoreError::not_found("Claim not found");

    match error {
        CoreError::NotFound(msg) => assert_eq!(msg, "Claim not found"),
        _ => panic!("Expected NotFound error"),
    }
}

#[test]
fn test_core_error_display() {
    let error = CoreError::validation("Test error");
    let display = format!("{}", error);

    assert!(display.contains("Validation error"));
}

#[test]
fn test_core_error_configuration() {
    let error = CoreError::configuration("Missing webhook secret");

    match error {
        CoreError::Configuration(msg) => assert_eq!(msg, "Missing webhook secret"),
        _ => panic!("Expected Configuration error"),
    }
}

#[test]
fn test_key_parse_failure_is_validation_error() {
    let error = ClaimId::parse("").unwrap_err();
    assert!(matches!(error, CoreError::Validation(_)));
    assert!(error.to_string().contains("claim id"));
}
