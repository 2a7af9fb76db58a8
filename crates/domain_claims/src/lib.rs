//! Claims Domain
//!
//! This crate implements the claim status lifecycle and the webhook pipeline
//! that drives it from external systems (payment gateway, fraud service,
//! document service), with every mutation recorded in an append-only audit
//! ledger.
//!
//! # Pipeline
//!
//! ```text
//! raw request -> WebhookNormalizer -> EventDispatcher -> UnitOfWork -> stores + ledger
//!                                                                          |
//!                                             timeline::project  <---------+
//! ```

pub mod audit;
pub mod claim;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod event;
pub mod normalizer;
pub mod ports;
pub mod services;
pub mod signature;
pub mod timeline;
pub mod unit_of_work;

pub use audit::{AuditAction, AuditDetails, AuditEntry, CommitState, Compensation, NewAuditEntry};
pub use claim::{Claim, ClaimStatus, FRAUD_THRESHOLD};
pub use dispatcher::{DispatchAction, DispatchOutcome, DispatchStatus, EventDispatcher, SkipReason};
pub use document::Document;
pub use error::{ClaimError, WebhookError};
pub use event::{CanonicalWebhookEvent, EventKind, EventPayload, EventSource};
pub use normalizer::{InboundWebhook, WebhookNormalizer, SIGNATURE_HEADER, SOURCE_HEADER};
pub use ports::{AuditLedgerPort, ClaimPort, DocumentPort};
pub use services::WebhookService;
pub use signature::{sign_payload, SignatureVerifier};
pub use timeline::{project, relative_time, TimelineCategory, TimelineItem};
pub use unit_of_work::{RecoveryReport, SubjectLocks, UnitOfWork};
