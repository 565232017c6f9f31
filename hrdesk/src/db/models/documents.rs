//! Database models for document metadata.

use crate::api::models::documents::{DocumentFileType, DocumentStatus, DocumentType};
use crate::types::{DocumentId, MemberId, OrganisationId};
use chrono::{DateTime, Utc};

/// Database request for registering a document whose upload has not happened yet
#[derive(Debug, Clone)]
pub struct DocumentCreateDBRequest {
    pub s3_key: String,
    pub file_name: String,
    pub file_type: DocumentFileType,
    pub document_type: DocumentType,
    pub org_id: OrganisationId,
    pub member_id: MemberId,
}

/// Database request for moving a document through its lifecycle.
///
/// Applied only while the stored status may legally transition to `status` and, when
/// `expected_s3_key` is set, while the document still points at that object.
#[derive(Debug, Clone)]
pub struct DocumentUpdateDBRequest {
    pub status: DocumentStatus,
    /// Verified size; written when the document becomes ready, cleared otherwise
    pub file_size: Option<i64>,
    /// Object the caller inspected before deciding on this transition
    pub expected_s3_key: Option<String>,
    /// New object and file details when the document is being replaced
    pub replacement: Option<DocumentReplacement>,
}

impl DocumentUpdateDBRequest {
    /// Mark ready after the object at `s3_key` was verified to hold `file_size` bytes
    pub fn ready(s3_key: impl Into<String>, file_size: i64) -> Self {
        Self {
            status: DocumentStatus::Ready,
            file_size: Some(file_size),
            expected_s3_key: Some(s3_key.into()),
            replacement: None,
        }
    }

    /// Mark failed after the object at `s3_key` did not verify
    pub fn failed(s3_key: impl Into<String>) -> Self {
        Self {
            status: DocumentStatus::Failed,
            file_size: None,
            expected_s3_key: Some(s3_key.into()),
            replacement: None,
        }
    }

    pub fn deleted() -> Self {
        Self {
            status: DocumentStatus::Deleted,
            file_size: None,
            expected_s3_key: None,
            replacement: None,
        }
    }

    /// Point the document at a new object, replacing the one at `current_s3_key`
    pub fn replaced(current_s3_key: impl Into<String>, replacement: DocumentReplacement) -> Self {
        Self {
            status: DocumentStatus::Pending,
            file_size: None,
            expected_s3_key: Some(current_s3_key.into()),
            replacement: Some(replacement),
        }
    }
}

/// Object and file details of a replacement upload
#[derive(Debug, Clone)]
pub struct DocumentReplacement {
    pub s3_key: String,
    pub file_name: String,
    pub file_type: DocumentFileType,
    pub document_type: DocumentType,
}

/// Database response for a document
#[derive(Debug, Clone)]
pub struct DocumentDBResponse {
    pub id: DocumentId,
    pub s3_key: String,
    pub file_name: String,
    pub file_type: DocumentFileType,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub file_size: Option<i64>,
    pub org_id: OrganisationId,
    pub member_id: MemberId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
