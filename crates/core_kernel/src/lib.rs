//! Core Kernel - Foundational types for the claims webhook system
//!
//! This crate provides the building blocks used across the workspace:
//! - Strongly-typed identifiers for claims, documents, and audit entries
//! - The shared error type for identifier and value validation
//! - Port abstractions implemented by storage adapters

pub mod identifiers;
pub mod error;
pub mod ports;

pub use identifiers::{AuditEntryId, ClaimId, DocumentId};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
