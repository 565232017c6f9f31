//! API request/response models for member documents.

use crate::db::models::documents::DocumentDBResponse;
use crate::errors::Error;
use crate::types::DocumentId;
use crate::validation::FieldErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use utoipa::ToSchema;

/// File extensions accepted for upload, lowercase and including the dot
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".pdf", ".png", ".jpg", ".jpeg"];

/// Upload lifecycle of a document.
///
/// ```text
/// PENDING ──complete──> READY
///    │  └──verify fail──> FAILED
///    └──────────┴─────────┴──delete──> DELETED
/// ```
///
/// Replacing a PENDING, READY or FAILED document returns it to PENDING. DELETED is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash, ToSchema)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Pending,
    Ready,
    Failed,
    Deleted,
}

impl DocumentStatus {
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (Deleted, _) => false,
            (Pending, Ready | Failed) => true,
            (_, Deleted | Pending) => true,
            _ => false,
        }
    }

    /// The states a document may be in for a transition to `next`
    pub fn sources_for(next: DocumentStatus) -> Vec<DocumentStatus> {
        [Self::Pending, Self::Ready, Self::Failed, Self::Deleted]
            .into_iter()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
            Self::Deleted => "DELETED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    NationalId,
    VisaPermit,
    Contract,
    TaxForm,
    Other,
}

/// MIME type of an uploaded file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
pub enum DocumentFileType {
    #[serde(rename = "application/pdf")]
    #[sqlx(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/png")]
    #[sqlx(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    #[sqlx(rename = "image/jpeg")]
    Jpeg,
}

impl DocumentFileType {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Request to start an upload, or to replace the file of an existing document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUploadRequest {
    pub file_name: String,
    pub file_type: DocumentFileType,
    pub document_type: DocumentType,
}

impl DocumentUploadRequest {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        errors.check_required("fileName", &self.file_name, 255, "File name is required", "File name too long");
        errors.into_result()
    }

    /// Lowercase extension of `file_name`, checked against the allowed set and the declared file type
    pub fn extension(&self) -> Result<&'static str, Error> {
        let ext = Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()));

        let ext = ext
            .and_then(|ext| ALLOWED_EXTENSIONS.into_iter().find(|allowed| *allowed == ext))
            .ok_or_else(|| Error::BadRequest {
                message: format!("Invalid file extension. Allowed: {}", ALLOWED_EXTENSIONS.join(", ")),
            })?;

        let matches_type = mime_guess::from_ext(&ext[1..])
            .iter()
            .any(|mime| mime.essence_str() == self.file_type.mime());
        if !matches_type {
            return Err(Error::BadRequest {
                message: format!("File extension {ext} does not match file type {}", self.file_type.mime()),
            });
        }

        Ok(ext)
    }
}

/// Presigned upload issued for a new or replaced document
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    #[schema(value_type = String, format = "uuid")]
    pub document_id: DocumentId,
    /// Object key the client uploads to
    pub key: String,
    pub upload_url: String,
}

/// Report that the client finished uploading
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    #[schema(value_type = String, format = "uuid")]
    pub document_id: DocumentId,
    /// Size in bytes the client uploaded; verified against the stored object when present
    pub expected_size: Option<i64>,
}

impl CompleteUploadRequest {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.expected_size.is_some_and(|size| size <= 0) {
            errors.add("expectedSize", "Expected size must be a positive integer");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DocumentId,
    pub file_name: String,
    pub file_type: DocumentFileType,
    pub document_type: DocumentType,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DocumentDBResponse> for DocumentResponse {
    fn from(db: DocumentDBResponse) -> Self {
        Self {
            id: db.id,
            file_name: db.file_name,
            file_type: db.file_type,
            document_type: db.document_type,
            file_size: db.file_size,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDownloadResponse {
    pub document: DocumentResponse,
    pub download_url: String,
    /// Seconds until `download_url` stops working
    pub expires_in: u64,
}
