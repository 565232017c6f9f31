//! Member documents.
//!
//! File bytes go directly between the client and object storage. An upload is a two-step exchange:
//! `initiate` registers a `PENDING` document and returns a presigned PUT URL, then `complete`
//! verifies the stored object and marks the document `READY` or `FAILED`. Downloads are presigned
//! GET URLs for `READY` documents.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::documents::{
        CompleteUploadRequest, DocumentDownloadResponse, DocumentResponse, DocumentStatus, DocumentUploadRequest, OkResponse,
        UploadUrlResponse,
    },
    auth::permissions::{OrgAccess, rule},
    db::{
        errors::DbError,
        handlers::{Documents, Members, Repository, documents::DocumentFilter},
        models::documents::{DocumentCreateDBRequest, DocumentDBResponse, DocumentReplacement, DocumentUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{DocumentId, MemberId, OrganisationId},
};

/// Ensure the member addressed by the path belongs to the organisation
async fn ensure_member(conn: &mut SqliteConnection, org_id: OrganisationId, member_id: MemberId) -> Result<()> {
    match Members::new(conn).get_in_organisation(org_id, member_id).await? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound {
            resource: "Member".to_string(),
            id: member_id.to_string(),
        }),
    }
}

async fn find_document(conn: &mut SqliteConnection, org_id: OrganisationId, member_id: MemberId, id: DocumentId) -> Result<DocumentDBResponse> {
    Documents::new(conn)
        .get_for_member(org_id, member_id, id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Document".to_string(),
            id: id.to_string(),
        })
}

/// Object key for a new upload: `{org_id}/{member_id}/{uuid}{ext}`
fn object_key(org_id: OrganisationId, member_id: MemberId, ext: &str) -> String {
    format!("{org_id}/{member_id}/{}{ext}", Uuid::new_v4())
}

fn file_too_large(max_file_size: i64) -> Error {
    Error::BadRequest {
        message: format!("File size exceeds maximum limit of {}MB", max_file_size / 1024 / 1024),
    }
}

/// Best-effort object removal; a leftover object only costs storage
async fn discard_object(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete(key).await {
        warn!(key, error = %e, "Failed to delete object");
    }
}

/// Mark a document FAILED. A concurrent request may already have moved it on, which is logged and ignored.
async fn mark_failed(conn: &mut SqliteConnection, document: &DocumentDBResponse) -> Result<()> {
    match Documents::new(conn)
        .update(document.id, &DocumentUpdateDBRequest::failed(&document.s3_key))
        .await
    {
        Ok(_) => Ok(()),
        Err(DbError::StaleState { .. }) => {
            warn!(document_id = %document.id, "Document changed before it could be marked failed");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Start uploading a document for a member
#[utoipa::path(
    post,
    path = "/organisations/{slug}/members/{member_id}/documents/initiate",
    tag = "documents",
    request_body = DocumentUploadRequest,
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
    ),
    responses(
        (status = 201, description = "Document registered; upload the file to `uploadUrl`", body = UploadUrlResponse),
        (status = 400, description = "Invalid file name or extension"),
        (status = 403, description = "Neither admin/HR nor the member themselves"),
        (status = 404, description = "Member not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn initiate_upload(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id)): Path<(String, MemberId)>,
    Json(request): Json<DocumentUploadRequest>,
) -> Result<(StatusCode, Json<UploadUrlResponse>)> {
    request.validate()?;
    let ext = request.extension()?;
    let org_id = access.organisation_id();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_member(&mut conn, org_id, member_id).await?;

    let key = object_key(org_id, member_id, ext);
    let upload_url = state
        .storage
        .presign_upload(&key, request.file_type.mime(), state.config.documents.upload_url_expiry)
        .await?;

    let document = Documents::new(&mut conn)
        .create(&DocumentCreateDBRequest {
            s3_key: key.clone(),
            file_name: request.file_name,
            file_type: request.file_type,
            document_type: request.document_type,
            org_id,
            member_id,
        })
        .await?;
    info!(document_id = %document.id, member_id = %member_id, "Initiated document upload");

    Ok((
        StatusCode::CREATED,
        Json(UploadUrlResponse {
            document_id: document.id,
            key,
            upload_url,
        }),
    ))
}

/// Verify an uploaded object and mark the document ready.
///
/// Objects over the size limit are deleted. Any failed check marks the document `FAILED`.
#[utoipa::path(
    post,
    path = "/organisations/{slug}/members/{member_id}/documents/complete",
    tag = "documents",
    request_body = CompleteUploadRequest,
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
    ),
    responses(
        (status = 200, description = "Document is ready", body = OkResponse),
        (status = 400, description = "Not awaiting upload, missing object, too large, or size mismatch"),
        (status = 403, description = "Neither admin/HR nor the member themselves"),
        (status = 404, description = "Member or document not found"),
        (status = 409, description = "The document was modified by another request"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn complete_upload(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id)): Path<(String, MemberId)>,
    Json(request): Json<CompleteUploadRequest>,
) -> Result<Json<OkResponse>> {
    request.validate()?;
    let org_id = access.organisation_id();
    let max_file_size = state.config.documents.max_file_size;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_member(&mut conn, org_id, member_id).await?;
    let document = find_document(&mut conn, org_id, member_id, request.document_id).await?;

    if document.status != DocumentStatus::Pending {
        return Err(Error::BadRequest {
            message: "Document is not awaiting upload".to_string(),
        });
    }

    if request.expected_size.is_some_and(|size| size > max_file_size) {
        discard_object(&state, &document.s3_key).await;
        mark_failed(&mut conn, &document).await?;
        return Err(file_too_large(max_file_size));
    }

    // A storage error counts as a failed verification
    let object = state.storage.head(&document.s3_key).await.unwrap_or_else(|e| {
        warn!(key = %document.s3_key, error = %e, "Failed to verify uploaded object");
        None
    });
    let Some(object) = object else {
        mark_failed(&mut conn, &document).await?;
        return Err(Error::BadRequest {
            message: "Object not found in storage".to_string(),
        });
    };

    if object.size > max_file_size {
        discard_object(&state, &document.s3_key).await;
        mark_failed(&mut conn, &document).await?;
        return Err(file_too_large(max_file_size));
    }

    if let Some(expected) = request.expected_size
        && expected != object.size
    {
        mark_failed(&mut conn, &document).await?;
        return Err(Error::BadRequest {
            message: format!("File size mismatch. Expected {expected} bytes, got {} bytes", object.size),
        });
    }

    Documents::new(&mut conn)
        .update(document.id, &DocumentUpdateDBRequest::ready(&document.s3_key, object.size))
        .await?;
    info!(document_id = %document.id, size = object.size, "Document upload completed");

    Ok(Json(OkResponse::ok()))
}

/// List a member's ready documents, newest first
#[utoipa::path(
    get,
    path = "/organisations/{slug}/members/{member_id}/documents",
    tag = "documents",
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
    ),
    responses(
        (status = 200, description = "Ready documents", body = [DocumentResponse]),
        (status = 403, description = "Neither admin/HR nor the member themselves"),
        (status = 404, description = "Member not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_documents(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id)): Path<(String, MemberId)>,
) -> Result<Json<Vec<DocumentResponse>>> {
    let org_id = access.organisation_id();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_member(&mut conn, org_id, member_id).await?;

    let documents = Documents::new(&mut conn)
        .list(&DocumentFilter::new(org_id, member_id).with_status(DocumentStatus::Ready))
        .await?;

    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

/// Get a ready document with a presigned download URL
#[utoipa::path(
    get,
    path = "/organisations/{slug}/members/{member_id}/documents/{document_id}",
    tag = "documents",
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
        ("document_id" = String, Path, description = "Document ID"),
    ),
    responses(
        (status = 200, description = "Document and download URL", body = DocumentDownloadResponse),
        (status = 400, description = "Document not ready"),
        (status = 403, description = "Neither admin/HR nor the member themselves"),
        (status = 404, description = "Member or document not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_document(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id, document_id)): Path<(String, MemberId, DocumentId)>,
) -> Result<Json<DocumentDownloadResponse>> {
    let org_id = access.organisation_id();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_member(&mut conn, org_id, member_id).await?;
    let document = find_document(&mut conn, org_id, member_id, document_id).await?;

    if document.status != DocumentStatus::Ready {
        return Err(Error::BadRequest {
            message: "Document not ready".to_string(),
        });
    }

    let expiry = state.config.documents.download_url_expiry;
    let download_url = state.storage.presign_download(&document.s3_key, &document.file_name, expiry).await?;

    Ok(Json(DocumentDownloadResponse {
        document: document.into(),
        download_url,
        expires_in: expiry.as_secs(),
    }))
}

/// Replace a document's file.
///
/// The document returns to `PENDING` under a new object key and must be completed again. The
/// previous object is deleted.
#[utoipa::path(
    put,
    path = "/organisations/{slug}/members/{member_id}/documents/{document_id}",
    tag = "documents",
    request_body = DocumentUploadRequest,
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
        ("document_id" = String, Path, description = "Document ID"),
    ),
    responses(
        (status = 200, description = "Upload the replacement file to `uploadUrl`", body = UploadUrlResponse),
        (status = 400, description = "Invalid file name or extension"),
        (status = 403, description = "Neither admin/HR nor the member themselves"),
        (status = 404, description = "Member or document not found"),
        (status = 409, description = "The document was modified by another request"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn replace_document(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id, document_id)): Path<(String, MemberId, DocumentId)>,
    Json(request): Json<DocumentUploadRequest>,
) -> Result<Json<UploadUrlResponse>> {
    request.validate()?;
    let ext = request.extension()?;
    let org_id = access.organisation_id();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_member(&mut conn, org_id, member_id).await?;
    let document = find_document(&mut conn, org_id, member_id, document_id).await?;

    let key = object_key(org_id, member_id, ext);
    let upload_url = state
        .storage
        .presign_upload(&key, request.file_type.mime(), state.config.documents.upload_url_expiry)
        .await?;

    Documents::new(&mut conn)
        .update(
            document.id,
            &DocumentUpdateDBRequest::replaced(&document.s3_key, DocumentReplacement {
                s3_key: key.clone(),
                file_name: request.file_name,
                file_type: request.file_type,
                document_type: request.document_type,
            }),
        )
        .await?;
    discard_object(&state, &document.s3_key).await;
    info!(document_id = %document.id, "Document replacement initiated");

    Ok(Json(UploadUrlResponse {
        document_id: document.id,
        key,
        upload_url,
    }))
}

/// Delete a document and its stored object. The record is kept with status `DELETED`.
#[utoipa::path(
    delete,
    path = "/organisations/{slug}/members/{member_id}/documents/{document_id}",
    tag = "documents",
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
        ("document_id" = String, Path, description = "Document ID"),
    ),
    responses(
        (status = 200, description = "Document deleted", body = OkResponse),
        (status = 403, description = "Admin or HR access required for this organisation"),
        (status = 404, description = "Member or document not found"),
        (status = 409, description = "The document was modified by another request"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_document(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHr>,
    Path((_slug, member_id, document_id)): Path<(String, MemberId, DocumentId)>,
) -> Result<Json<OkResponse>> {
    let org_id = access.organisation_id();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ensure_member(&mut conn, org_id, member_id).await?;
    let document = find_document(&mut conn, org_id, member_id, document_id).await?;

    discard_object(&state, &document.s3_key).await;
    Documents::new(&mut conn)
        .update(document.id, &DocumentUpdateDBRequest::deleted())
        .await?;
    info!(document_id = %document.id, "Document deleted");

    Ok(Json(OkResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::members::MemberRole;
    use crate::api::models::users::UserRole;
    use crate::db::models::{members::MemberDBResponse, organisations::OrganisationDBResponse, users::UserDBResponse};
    use crate::storage::{MemoryObjectStore, ObjectMetadata, ObjectStore, StorageError};
    use crate::test_utils::{
        bearer, create_test_app_state_with_store, create_test_config, create_test_organisation, create_test_server, create_test_user,
        create_test_user_in_org,
    };
    use async_trait::async_trait;
    use std::{sync::Arc, time::Duration};
    use axum_test::TestServer;
    use serde_json::json;
    use sqlx::SqlitePool;

    struct Fixture {
        org: OrganisationDBResponse,
        admin: UserDBResponse,
        hr: UserDBResponse,
        employee: UserDBResponse,
        employee_member: MemberDBResponse,
        colleague: UserDBResponse,
    }

    impl Fixture {
        fn documents_path(&self) -> String {
            format!("/api/organisations/{}/members/{}/documents", self.org.slug, self.employee_member.id)
        }

        fn document_path(&self, id: impl std::fmt::Display) -> String {
            format!("{}/{id}", self.documents_path())
        }
    }

    async fn fixture(pool: &SqlitePool) -> Fixture {
        let admin = create_test_user(pool, UserRole::User).await;
        let (org, _) = create_test_organisation(pool, &admin).await;
        let (hr, _) = create_test_user_in_org(pool, org.id, MemberRole::Hr).await;
        let (employee, employee_member) = create_test_user_in_org(pool, org.id, MemberRole::Employee).await;
        let (colleague, _) = create_test_user_in_org(pool, org.id, MemberRole::Employee).await;
        Fixture {
            org,
            admin,
            hr,
            employee,
            employee_member,
            colleague,
        }
    }

    async fn initiate(server: &TestServer, fx: &Fixture, user: &UserDBResponse, file_name: &str) -> UploadUrlResponse {
        let response = server
            .post(&format!("{}/initiate", fx.documents_path()))
            .add_header("authorization", bearer(user))
            .json(&json!({
                "fileName": file_name,
                "fileType": "application/pdf",
                "documentType": "contract"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    async fn complete(server: &TestServer, fx: &Fixture, document_id: DocumentId, expected_size: Option<i64>) -> axum_test::TestResponse {
        server
            .post(&format!("{}/complete", fx.documents_path()))
            .add_header("authorization", bearer(&fx.employee))
            .json(&json!({"documentId": document_id, "expectedSize": expected_size}))
            .await
    }

    async fn status_of(pool: &SqlitePool, id: DocumentId) -> DocumentStatus {
        let mut conn = pool.acquire().await.unwrap();
        Documents::new(&mut conn).get_by_id(id).await.unwrap().unwrap().status
    }

    async fn upload_ready(server: &TestServer, store: &MemoryObjectStore, fx: &Fixture, file_name: &str) -> UploadUrlResponse {
        let upload = initiate(server, fx, &fx.employee, file_name).await;
        store.put_object(&upload.key, vec![7u8; 2048]);
        complete(server, fx, upload.document_id, Some(2048)).await.assert_status_ok();
        upload
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_lifecycle(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());

        let upload = initiate(&server, &fx, &fx.employee, "Contract.PDF").await;
        assert!(upload.key.starts_with(&format!("{}/{}/", fx.org.id, fx.employee_member.id)));
        assert!(upload.key.ends_with(".pdf"));
        assert!(upload.upload_url.contains("x-method=PUT"));
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Pending);

        // Pending documents are neither listed nor downloadable
        let listed: Vec<DocumentResponse> = server
            .get(&fx.documents_path())
            .add_header("authorization", bearer(&fx.employee))
            .await
            .json();
        assert!(listed.is_empty());
        let response = server
            .get(&fx.document_path(upload.document_id))
            .add_header("authorization", bearer(&fx.employee))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Document not ready");

        store.put_object(&upload.key, vec![1u8; 4096]);
        let response = complete(&server, &fx, upload.document_id, Some(4096)).await;
        response.assert_status_ok();
        response.assert_json(&json!({"ok": true}));

        // Completing twice is rejected
        let response = complete(&server, &fx, upload.document_id, Some(4096)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Document is not awaiting upload");

        let response = server
            .get(&fx.document_path(upload.document_id))
            .add_header("authorization", bearer(&fx.hr))
            .await;
        response.assert_status_ok();
        let download: DocumentDownloadResponse = response.json();
        assert_eq!(download.document.file_name, "Contract.PDF");
        assert_eq!(download.document.file_size, Some(4096));
        assert_eq!(download.expires_in, 90);
        assert!(download.download_url.contains("x-method=GET"));
        assert!(download.download_url.contains("response-content-disposition="));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_without_expected_size(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());

        let upload = initiate(&server, &fx, &fx.employee, "id.pdf").await;
        store.put_object(&upload.key, vec![0u8; 10]);
        complete(&server, &fx, upload.document_id, None).await.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let document = Documents::new(&mut conn).get_by_id(upload.document_id).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Ready);
        assert_eq!(document.file_size, Some(10));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_missing_object_fails(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, _) = create_test_server(pool.clone());

        let upload = initiate(&server, &fx, &fx.employee, "id.pdf").await;
        let response = complete(&server, &fx, upload.document_id, Some(100)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Object not found in storage");
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Failed);
    }

    /// Memory store whose object probes are refused by the backend
    struct UnreachableHeadStore(MemoryObjectStore);

    #[async_trait]
    impl ObjectStore for UnreachableHeadStore {
        async fn presign_upload(&self, key: &str, content_type: &str, expires_in: Duration) -> std::result::Result<String, StorageError> {
            self.0.presign_upload(key, content_type, expires_in).await
        }

        async fn presign_download(&self, key: &str, download_name: &str, expires_in: Duration) -> std::result::Result<String, StorageError> {
            self.0.presign_download(key, download_name, expires_in).await
        }

        async fn head(&self, key: &str) -> std::result::Result<Option<ObjectMetadata>, StorageError> {
            Err(StorageError::Backend {
                operation: "head",
                key: key.to_string(),
                source: anyhow::anyhow!("403 Forbidden"),
            })
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), StorageError> {
            self.0.delete(key).await
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_storage_error_fails(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let store = Arc::new(UnreachableHeadStore(MemoryObjectStore::new("test-documents")));
        let state = AppState::builder()
            .db(pool.clone())
            .config(create_test_config())
            .storage(store.clone())
            .build();
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        let upload = initiate(&server, &fx, &fx.employee, "id.pdf").await;
        store.0.put_object(&upload.key, vec![0u8; 100]);
        let response = complete(&server, &fx, upload.document_id, Some(100)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Object not found in storage");
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Failed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_after_replacement_conflicts(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());
        let original = upload_ready(&server, &store, &fx, "contract.pdf").await;

        let replacement: UploadUrlResponse = server
            .put(&fx.document_path(original.document_id))
            .add_header("authorization", bearer(&fx.employee))
            .json(&json!({"fileName": "contract.pdf", "fileType": "application/pdf", "documentType": "contract"}))
            .await
            .json();

        // Recording a result for the superseded object is rejected
        let mut conn = pool.acquire().await.unwrap();
        let err = Documents::new(&mut conn)
            .update(original.document_id, &DocumentUpdateDBRequest::ready(&original.key, 2048))
            .await
            .unwrap_err();
        assert_eq!(Error::from(err).status_code(), StatusCode::CONFLICT);

        let document = Documents::new(&mut conn).get_by_id(original.document_id).await.unwrap().unwrap();
        assert_eq!(document.status, DocumentStatus::Pending);
        assert_eq!(document.s3_key, replacement.key);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_size_mismatch_fails(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());

        let upload = initiate(&server, &fx, &fx.employee, "id.pdf").await;
        store.put_object(&upload.key, vec![0u8; 99]);
        let response = complete(&server, &fx, upload.document_id, Some(100)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "File size mismatch. Expected 100 bytes, got 99 bytes");
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Failed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_rejects_oversized_files(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (mut state, store) = create_test_app_state_with_store(pool.clone());
        state.config.documents.max_file_size = 2 * 1024 * 1024;
        let server = TestServer::new(crate::build_router(&state).unwrap()).unwrap();

        // Declared size over the limit
        let upload = initiate(&server, &fx, &fx.employee, "big.pdf").await;
        store.put_object(&upload.key, vec![0u8; 16]);
        let response = complete(&server, &fx, upload.document_id, Some(3 * 1024 * 1024)).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "File size exceeds maximum limit of 2MB");
        assert!(!store.contains(&upload.key));
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Failed);

        // Stored object over the limit
        let upload = initiate(&server, &fx, &fx.employee, "big.pdf").await;
        store.put_object(&upload.key, vec![0u8; 2 * 1024 * 1024 + 1]);
        let response = complete(&server, &fx, upload.document_id, None).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(!store.contains(&upload.key));
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Failed);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_initiate_validation(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, _) = create_test_server(pool);
        let path = format!("{}/initiate", fx.documents_path());

        let response = server
            .post(&path)
            .add_header("authorization", bearer(&fx.employee))
            .json(&json!({"fileName": "notes.docx", "fileType": "application/pdf", "documentType": "other"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Invalid file extension. Allowed: .pdf, .png, .jpg, .jpeg");

        server
            .post(&path)
            .add_header("authorization", bearer(&fx.employee))
            .json(&json!({"fileName": "", "fileType": "application/pdf", "documentType": "other"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post(&path)
            .add_header("authorization", bearer(&fx.employee))
            .json(&json!({"fileName": "scan.gif", "fileType": "image/gif", "documentType": "other"}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_document_access(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());
        let upload = upload_ready(&server, &store, &fx, "contract.pdf").await;

        // Colleagues cannot see another member's documents
        let response = server
            .get(&fx.documents_path())
            .add_header("authorization", bearer(&fx.colleague))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        server
            .get(&fx.document_path(upload.document_id))
            .add_header("authorization", bearer(&fx.colleague))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        for user in [&fx.employee, &fx.hr, &fx.admin] {
            let documents: Vec<DocumentResponse> = server
                .get(&fx.documents_path())
                .add_header("authorization", bearer(user))
                .await
                .json();
            assert_eq!(documents.len(), 1);
            assert_eq!(documents[0].id, upload.document_id);
        }

        // A document is only reachable through its own member
        let missing_path = format!(
            "/api/organisations/{}/members/{}/documents/{}",
            fx.org.slug,
            fx.employee_member.id,
            Uuid::new_v4()
        );
        let response = server.get(&missing_path).add_header("authorization", bearer(&fx.admin)).await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Document not found");

        let response = server
            .get(&format!("/api/organisations/{}/members/{}/documents", fx.org.slug, Uuid::new_v4()))
            .add_header("authorization", bearer(&fx.admin))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_is_newest_first_and_ready_only(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool);

        let first = upload_ready(&server, &store, &fx, "first.pdf").await;
        let second = upload_ready(&server, &store, &fx, "second.pdf").await;
        initiate(&server, &fx, &fx.employee, "pending.pdf").await;

        let documents: Vec<DocumentResponse> = server
            .get(&fx.documents_path())
            .add_header("authorization", bearer(&fx.employee))
            .await
            .json();
        let ids: Vec<DocumentId> = documents.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![second.document_id, first.document_id]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replace_document(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());
        let original = upload_ready(&server, &store, &fx, "contract.pdf").await;

        let response = server
            .put(&fx.document_path(original.document_id))
            .add_header("authorization", bearer(&fx.employee))
            .json(&json!({"fileName": "contract-signed.png", "fileType": "image/png", "documentType": "contract"}))
            .await;
        response.assert_status_ok();
        let replacement: UploadUrlResponse = response.json();
        assert_eq!(replacement.document_id, original.document_id);
        assert_ne!(replacement.key, original.key);
        assert!(replacement.key.ends_with(".png"));
        assert!(!store.contains(&original.key));
        assert_eq!(status_of(&pool, original.document_id).await, DocumentStatus::Pending);

        store.put_object(&replacement.key, vec![0u8; 512]);
        complete(&server, &fx, replacement.document_id, Some(512)).await.assert_status_ok();

        let download: DocumentDownloadResponse = server
            .get(&fx.document_path(original.document_id))
            .add_header("authorization", bearer(&fx.employee))
            .await
            .json();
        assert_eq!(download.document.file_name, "contract-signed.png");
        assert_eq!(download.document.file_size, Some(512));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_document(pool: SqlitePool) {
        let fx = fixture(&pool).await;
        let (server, store) = create_test_server(pool.clone());
        let upload = upload_ready(&server, &store, &fx, "contract.pdf").await;
        let path = fx.document_path(upload.document_id);

        let response = server.delete(&path).add_header("authorization", bearer(&fx.employee)).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "Admin or HR access required for this organisation");

        let response = server.delete(&path).add_header("authorization", bearer(&fx.hr)).await;
        response.assert_status_ok();
        response.assert_json(&json!({"ok": true}));
        assert!(!store.contains(&upload.key));
        assert_eq!(status_of(&pool, upload.document_id).await, DocumentStatus::Deleted);

        // Deleted documents are gone from every read path
        server
            .get(&path)
            .add_header("authorization", bearer(&fx.admin))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&path)
            .add_header("authorization", bearer(&fx.admin))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let documents: Vec<DocumentResponse> = server
            .get(&fx.documents_path())
            .add_header("authorization", bearer(&fx.admin))
            .await
            .json();
        assert!(documents.is_empty());
    }
}
