//! Database repository for document metadata.
//!
//! Status changes go through [`Repository::update`], which only applies when the stored status may
//! legally move to the requested one and the document still points at the object the caller
//! inspected. The check and the write are a single statement, so two requests racing on the same
//! document cannot both succeed.

use crate::types::{DocumentId, MemberId, OrganisationId, abbrev_uuid};
use crate::{
    api::models::documents::{DocumentFileType, DocumentStatus, DocumentType},
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::documents::{DocumentCreateDBRequest, DocumentDBResponse, DocumentUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Filter for listing the documents of one member
#[derive(Debug, Clone)]
pub struct DocumentFilter {
    pub org_id: OrganisationId,
    pub member_id: MemberId,
    pub status: Option<DocumentStatus>,
}

impl DocumentFilter {
    pub fn new(org_id: OrganisationId, member_id: MemberId) -> Self {
        Self {
            org_id,
            member_id,
            status: None,
        }
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, FromRow)]
struct Document {
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

impl From<Document> for DocumentDBResponse {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            s3_key: d.s3_key,
            file_name: d.file_name,
            file_type: d.file_type,
            document_type: d.document_type,
            status: d.status,
            file_size: d.file_size,
            org_id: d.org_id,
            member_id: d.member_id,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

pub struct Documents<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Documents<'c> {
    type CreateRequest = DocumentCreateDBRequest;
    type UpdateRequest = DocumentUpdateDBRequest;
    type Response = DocumentDBResponse;
    type Id = DocumentId;
    type Filter = DocumentFilter;

    /// Register a document in `PENDING` state
    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&request.member_id), key = %request.s3_key), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (id, s3_key, file_name, file_type, document_type, status, org_id, member_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.s3_key)
        .bind(&request.file_name)
        .bind(request.file_type)
        .bind(request.document_type)
        .bind(DocumentStatus::Pending)
        .bind(request.org_id)
        .bind(request.member_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        record_transition(DocumentStatus::Pending);
        Ok(document.into())
    }

    #[instrument(skip(self), fields(document_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let document = sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(document.map(Into::into))
    }

    /// Documents of a member, newest first
    #[instrument(skip(self, filter), fields(member_id = %abbrev_uuid(&filter.member_id), status = ?filter.status), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let documents = sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents
            WHERE org_id = ? AND member_id = ? AND (? IS NULL OR status = ?)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(filter.org_id)
        .bind(filter.member_id)
        .bind(filter.status)
        .bind(filter.status)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Move a document to `request.status`.
    ///
    /// Fails with [`DbError::StaleState`] when the document exists but its current status does not
    /// allow the transition or its object key differs from `request.expected_s3_key`, and
    /// [`DbError::NotFound`] when it does not exist.
    #[instrument(skip(self, request), fields(document_id = %abbrev_uuid(&id), status = %request.status.as_str()), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let sources = DocumentStatus::sources_for(request.status);
        let placeholders = vec!["?"; sources.len()].join(", ");
        let replacement = request.replacement.as_ref();

        let sql = format!(
            r#"
            UPDATE documents SET
                status = ?,
                file_size = ?,
                s3_key = COALESCE(?, s3_key),
                file_name = COALESCE(?, file_name),
                file_type = COALESCE(?, file_type),
                document_type = COALESCE(?, document_type),
                updated_at = ?
            WHERE id = ? AND (? IS NULL OR s3_key = ?) AND status IN ({placeholders})
            RETURNING *
            "#
        );

        let mut query = sqlx::query_as::<_, Document>(&sql)
            .bind(request.status)
            .bind(request.file_size)
            .bind(replacement.map(|r| r.s3_key.as_str()))
            .bind(replacement.map(|r| r.file_name.as_str()))
            .bind(replacement.map(|r| r.file_type))
            .bind(replacement.map(|r| r.document_type))
            .bind(Utc::now())
            .bind(id)
            .bind(request.expected_s3_key.as_deref())
            .bind(request.expected_s3_key.as_deref());
        for source in &sources {
            query = query.bind(*source);
        }

        match query.fetch_optional(&mut *self.db).await? {
            Some(document) => {
                record_transition(request.status);
                Ok(document.into())
            }
            None => {
                let exists = sqlx::query("SELECT 1 FROM documents WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&mut *self.db)
                    .await?
                    .is_some();
                if exists {
                    debug!("Document status no longer allows transition to {}", request.status.as_str());
                    Err(DbError::StaleState {
                        entity_type: "document".to_string(),
                        entity_id: id.to_string(),
                    })
                } else {
                    Err(DbError::NotFound)
                }
            }
        }
    }
}

impl<'c> Documents<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Get a live (not `DELETED`) document belonging to the given member of the given organisation
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&member_id), document_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_member(&mut self, org_id: OrganisationId, member_id: MemberId, id: DocumentId) -> Result<Option<DocumentDBResponse>> {
        let document = sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE id = ? AND org_id = ? AND member_id = ? AND status != ?",
        )
        .bind(id)
        .bind(org_id)
        .bind(member_id)
        .bind(DocumentStatus::Deleted)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(document.map(Into::into))
    }
}

fn record_transition(status: DocumentStatus) {
    metrics::counter!("hrdesk_document_transitions_total", "status" => status.as_str()).increment(1);
}
