//! Test Utilities Crate
//!
//! Shared test infrastructure for the claims webhook workspace.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built claims, documents, and timestamps
//! - `builders`: Webhook bodies, signed deliveries, claims, wired stores
//! - `database`: PostgreSQL test containers
//! - `assertions`: Assertion helpers for audit trails and timelines
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
