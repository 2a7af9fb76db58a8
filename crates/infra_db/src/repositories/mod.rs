//! Repository implementations for the claims store
//!
//! Repositories encapsulate SQL and speak in row types. Mapping to domain
//! types happens in [`crate::adapters`].
//!
//! Queries are built at runtime with `sqlx::query_as` and `FromRow` rows, so
//! the crate builds without a live database.

pub mod audit;
pub mod claims;
pub mod documents;

pub use audit::{AuditEntryRow, AuditRepository, NewAuditEntryRow};
pub use claims::{ClaimRow, ClaimsRepository};
pub use documents::{DocumentRow, DocumentsRepository};
