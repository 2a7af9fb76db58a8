//! PostgreSQL Document Adapter

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::instrument;

use core_kernel::{AuditEntryId, ClaimId, DocumentId, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_claims::{Document, DocumentPort};

use crate::repositories::documents::{DocumentRow, DocumentsRepository};

/// PostgreSQL-backed implementation of `DocumentPort`
#[derive(Debug, Clone)]
pub struct PostgresDocumentAdapter {
    repository: DocumentsRepository,
    pool: PgPool,
}

impl PostgresDocumentAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: DocumentsRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresDocumentAdapter {}

#[async_trait]
impl HealthCheckable for PostgresDocumentAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::ping(&self.pool, "postgres-document-adapter").await
    }
}

#[async_trait]
impl DocumentPort for PostgresDocumentAdapter {
    #[instrument(skip(self), fields(document_id = %id))]
    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>, PortError> {
        self.repository
            .find_by_id(id.as_str())
            .await?
            .map(row_to_document)
            .transpose()
    }

    async fn insert_document(&self, document: Document) -> Result<Document, PortError> {
        let row = self.repository.insert(&document_to_row(&document)).await?;
        row_to_document(row)
    }

    #[instrument(skip(self, document), fields(document_id = %document.id))]
    async fn update_document(
        &self,
        document: Document,
        expected_version: i64,
    ) -> Result<Document, PortError> {
        let row = self
            .repository
            .update(&document_to_row(&document), expected_version)
            .await?;
        row_to_document(row)
    }
}

fn document_to_row(document: &Document) -> DocumentRow {
    DocumentRow {
        document_id: document.id.to_string(),
        claim_id: document.claim_id.as_ref().map(ToString::to_string),
        analyzed: document.analyzed,
        analysis: Value::Object(document.analysis.clone()),
        analyzed_at: document.analyzed_at,
        version: document.version,
        last_entry_id: document.last_entry_id.map(|id| *id.as_uuid()),
        created_at: document.created_at,
        updated_at: document.updated_at,
    }
}

fn row_to_document(row: DocumentRow) -> Result<Document, PortError> {
    let transform = |e: core_kernel::CoreError| PortError::transformation(e.to_string());

    let analysis = match row.analysis {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(PortError::transformation(format!(
                "document analysis must be an object, found {other}"
            )))
        }
    };

    Ok(Document {
        id: DocumentId::parse(&row.document_id).map_err(transform)?,
        claim_id: row.claim_id.map(ClaimId::parse).transpose().map_err(transform)?,
        analyzed: row.analyzed,
        analysis,
        analyzed_at: row.analyzed_at,
        version: row.version,
        last_entry_id: row.last_entry_id.map(AuditEntryId::from_uuid),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
