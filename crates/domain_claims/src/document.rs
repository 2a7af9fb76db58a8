//! Claim documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use core_kernel::{AuditEntryId, ClaimId, DocumentId};

/// A document attached to a claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub claim_id: Option<ClaimId>,
    pub analyzed: bool,
    /// Result reported by the document service
    pub analysis: Map<String, Value>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub version: i64,
    /// Audit entry whose unit of work wrote this version
    #[serde(default)]
    pub last_entry_id: Option<AuditEntryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates an unanalyzed document
    pub fn new(id: DocumentId, claim_id: Option<ClaimId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            claim_id,
            analyzed: false,
            analysis: Map::new(),
            analyzed_at: None,
            version: 0,
            last_entry_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stores an analysis result, replacing any earlier one
    pub fn mark_analyzed(&mut self, analysis: Map<String, Value>, at: DateTime<Utc>) {
        self.analyzed = true;
        self.analysis = analysis;
        self.analyzed_at = Some(at);
        self.updated_at = at;
    }
}
