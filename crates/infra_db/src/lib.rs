//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the claims webhook pipeline using SQLx: the claim
//! and document state stores and the append-only audit ledger.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories own the SQL and
//! return row types; adapters implement the `domain_claims` ports on top of
//! them so the domain layer never sees the database.
//!
//! # Audit Ledger
//!
//! Audit rows are immutable once written apart from a single move out of
//! `pending`. Recorded timestamps are strictly increasing across the table.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresAuditLedger};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/claims")).await?;
//! run_migrations(&pool).await?;
//! let ledger = PostgresAuditLedger::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PostgresAuditLedger, PostgresClaimAdapter, PostgresDocumentAdapter};
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
