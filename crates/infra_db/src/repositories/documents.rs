//! Documents repository implementation

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

const DOCUMENT_COLUMNS: &str = r#"
    document_id, claim_id, analyzed, analysis, analyzed_at, version, last_entry_id, created_at, updated_at
"#;

/// Repository for claim documents
#[derive(Debug, Clone)]
pub struct DocumentsRepository {
    pool: PgPool,
}

/// A row of the `documents` table
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DocumentRow {
    pub document_id: String,
    pub claim_id: Option<String>,
    pub analyzed: bool,
    pub analysis: Value,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub last_entry_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, document_id: &str) -> Result<Option<DocumentRow>, DatabaseError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = $1");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn insert(&self, document: &DocumentRow) -> Result<DocumentRow, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO documents (
                document_id, claim_id, analyzed, analysis, analyzed_at, version, last_entry_id,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, 1, $6, $7, $8)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(&document.document_id)
            .bind(&document.claim_id)
            .bind(document.analyzed)
            .bind(&document.analysis)
            .bind(document.analyzed_at)
            .bind(document.last_entry_id)
            .bind(document.created_at)
            .bind(document.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    /// Replaces a document if it is still at `expected_version`
    pub async fn update(
        &self,
        document: &DocumentRow,
        expected_version: i64,
    ) -> Result<DocumentRow, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE documents SET
                claim_id = $2,
                analyzed = $3,
                analysis = $4,
                analyzed_at = $5,
                updated_at = $6,
                last_entry_id = $7,
                version = version + 1
            WHERE document_id = $1 AND version = $8
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(&document.document_id)
            .bind(&document.claim_id)
            .bind(document.analyzed)
            .bind(&document.analysis)
            .bind(document.analyzed_at)
            .bind(document.updated_at)
            .bind(document.last_entry_id)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(row) => Ok(row),
            None => match self.find_by_id(&document.document_id).await? {
                Some(_) => Err(DatabaseError::version_conflict(
                    "Document",
                    &document.document_id,
                    expected_version,
                )),
                None => Err(DatabaseError::not_found("Document", &document.document_id)),
            },
        }
    }
}
