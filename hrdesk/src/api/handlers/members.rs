use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        members::{MemberCreate, MemberResponse, MemberRole, MemberSelfUpdate, MemberUpdate, MembershipResponse},
        users::CurrentUser,
    },
    auth::permissions::{OrgAccess, rule},
    db::{
        handlers::{Members, Repository, Users},
        models::members::{MemberCreateDBRequest, MemberDBResponse, MemberUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{MemberId, OrganisationId},
};
use sqlx::SqliteConnection;

fn member_not_found(id: MemberId) -> Error {
    Error::NotFound {
        resource: "Member".to_string(),
        id: id.to_string(),
    }
}

async fn find_member(conn: &mut SqliteConnection, org_id: OrganisationId, id: MemberId) -> Result<MemberDBResponse> {
    Members::new(conn)
        .get_in_organisation(org_id, id)
        .await?
        .ok_or_else(|| member_not_found(id))
}

fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::BadRequest {
        message: format!("Invalid request body: {e}"),
    })
}

/// List the caller's active memberships across organisations, newest first
#[utoipa::path(
    get,
    path = "/members/me",
    tag = "members",
    responses(
        (status = 200, description = "The caller's memberships", body = [MembershipResponse]),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_memberships(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<MembershipResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let memberships = Members::new(&mut conn).list_memberships(current_user.id).await?;

    Ok(Json(memberships.into_iter().map(MembershipResponse::from).collect()))
}

/// Add a member to an organisation.
///
/// Without a `userId`, the member is linked to an existing account with the same email, or
/// later when such an account signs up.
#[utoipa::path(
    post,
    path = "/organisations/{slug}/members",
    tag = "members",
    request_body = MemberCreate,
    params(("slug" = String, Path, description = "Organisation slug")),
    responses(
        (status = 201, description = "Member created", body = MemberResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin or HR access required, or HR creating an admin"),
        (status = 409, description = "A member with this email already exists in this organisation"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_member(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHr>,
    Json(mut create): Json<MemberCreate>,
) -> Result<(StatusCode, Json<MemberResponse>)> {
    create.validate()?;

    if create.role == MemberRole::Admin && !access.is_admin() {
        return Err(Error::InsufficientPermissions {
            message: "Only organisation admins can create admin members".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if create.user_id.is_none() {
        create.user_id = Users::new(&mut conn).get_user_by_email(&create.email).await?.map(|user| user.id);
    }

    let member = Members::new(&mut conn)
        .create(&MemberCreateDBRequest::new(access.organisation_id(), create))
        .await?;
    info!(org_id = %member.org_id, member_id = %member.id, role = ?member.role, "Created member");

    Ok((StatusCode::CREATED, Json(member.into())))
}

/// Get one member of an organisation
#[utoipa::path(
    get,
    path = "/organisations/{slug}/members/{member_id}",
    tag = "members",
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
    ),
    responses(
        (status = 200, description = "The member", body = MemberResponse),
        (status = 403, description = "Neither admin/HR nor the member themselves"),
        (status = 404, description = "Member not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_member(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id)): Path<(String, MemberId)>,
) -> Result<Json<MemberResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = find_member(&mut conn, access.organisation_id(), member_id).await?;

    Ok(Json(member.into()))
}

/// Update a member.
///
/// Admins and HR send a full [`MemberUpdate`]; HR may not grant or revoke the admin role. Members
/// editing their own record may only change their name ([`MemberSelfUpdate`]).
#[utoipa::path(
    patch,
    path = "/organisations/{slug}/members/{member_id}",
    tag = "members",
    request_body(content = MemberUpdate, description = "Full update for admins and HR; `{name}` only when updating your own record"),
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
    ),
    responses(
        (status = 200, description = "Updated member", body = MemberResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Insufficient privileges for this change"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "A member with this email already exists in this organisation"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_member(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHrOrSelf>,
    Path((_slug, member_id)): Path<(String, MemberId)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<MemberResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let target = find_member(&mut conn, access.organisation_id(), member_id).await?;

    let request = if access.is_admin_or_hr() {
        let update: MemberUpdate = parse_body(body)?;
        update.validate()?;

        let touches_admin = update.role != target.role && (update.role == MemberRole::Admin || target.role == MemberRole::Admin);
        if touches_admin && !access.is_admin() {
            return Err(Error::InsufficientPermissions {
                message: "Only organisation admins can grant or revoke the admin role".to_string(),
            });
        }
        MemberUpdateDBRequest::from(update)
    } else {
        let update: MemberSelfUpdate = parse_body(body)?;
        update.validate()?;
        MemberUpdateDBRequest {
            name: Some(update.name),
            ..Default::default()
        }
    };

    let member = Members::new(&mut conn).update(target.id, &request).await?;
    Ok(Json(member.into()))
}

/// Deactivate a member. The record is kept with status `inactive`.
#[utoipa::path(
    delete,
    path = "/organisations/{slug}/members/{member_id}",
    tag = "members",
    params(
        ("slug" = String, Path, description = "Organisation slug"),
        ("member_id" = String, Path, description = "Member ID"),
    ),
    responses(
        (status = 200, description = "Deactivated member", body = MemberResponse),
        (status = 400, description = "Admins cannot deactivate themselves"),
        (status = 403, description = "Admin access required for this organisation"),
        (status = 404, description = "Member not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn deactivate_member(
    State(state): State<AppState>,
    access: OrgAccess<rule::Admin>,
    Path((_slug, member_id)): Path<(String, MemberId)>,
) -> Result<Json<MemberResponse>> {
    if member_id == access.membership.id {
        return Err(Error::BadRequest {
            message: "You cannot deactivate your own membership".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let target = find_member(&mut conn, access.organisation_id(), member_id).await?;

    let member = Members::new(&mut conn).deactivate(target.id).await?;
    info!(org_id = %member.org_id, member_id = %member.id, "Deactivated member");

    Ok(Json(member.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::members::MemberStatus;
    use crate::api::models::users::UserRole;
    use crate::test_utils::{
        bearer, create_test_member, create_test_organisation, create_test_server, create_test_user, create_test_user_in_org,
    };
    use serde_json::json;
    use sqlx::SqlitePool;
    use uuid::Uuid;

    fn new_member(role: &str, email: &str) -> serde_json::Value {
        json!({
            "role": role,
            "name": "New Starter",
            "email": email,
            "dept": "Engineering",
            "startDate": "2025-03-01T09:00:00Z",
            "status": "pending",
            "country": "Ireland"
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_member(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let (server, _) = create_test_server(pool);
        let path = format!("/api/organisations/{}/members", org.slug);

        let response = server
            .post(&path)
            .add_header("authorization", bearer(&founder))
            .json(&new_member("employee", "starter@example.com"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let member: MemberResponse = response.json();
        assert_eq!(member.org_id, org.id);
        assert_eq!(member.user_id, None);
        assert_eq!(member.status, MemberStatus::Pending);
        assert_eq!(member.dept.as_deref(), Some("Engineering"));

        let response = server
            .post(&path)
            .add_header("authorization", bearer(&founder))
            .json(&new_member("employee", "starter@example.com"))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "A member with this email already exists in this organisation");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_member_links_existing_account(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let existing = create_test_user(&pool, UserRole::User).await;
        let (server, _) = create_test_server(pool);

        let response = server
            .post(&format!("/api/organisations/{}/members", org.slug))
            .add_header("authorization", bearer(&founder))
            .json(&new_member("hr", &existing.email))
            .await;
        response.assert_status(StatusCode::CREATED);
        let member: MemberResponse = response.json();
        assert_eq!(member.user_id, Some(existing.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_member_email_is_case_insensitive(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let (server, _) = create_test_server(pool);
        let path = format!("/api/organisations/{}/members", org.slug);

        let response = server
            .post(&path)
            .add_header("authorization", bearer(&founder))
            .json(&new_member("employee", "Grace.Hopper@Example.com"))
            .await;
        response.assert_status(StatusCode::CREATED);
        let member: MemberResponse = response.json();
        assert_eq!(member.email, "grace.hopper@example.com");

        server
            .post(&path)
            .add_header("authorization", bearer(&founder))
            .json(&new_member("employee", "grace.hopper@example.com"))
            .await
            .assert_status(StatusCode::CONFLICT);

        // Signing up with another casing claims the member record
        let response = server
            .post("/api/auth/sign-up/email")
            .json(&json!({"name": "Grace", "email": "GRACE.HOPPER@example.com", "password": "password123"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        let token = cookie.split(';').next().unwrap().to_string();
        let memberships: Vec<MembershipResponse> = server.get("/api/members/me").add_header("cookie", token).await.json();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].member.id, member.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_member_rejects_invalid_input(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let (server, _) = create_test_server(pool);
        let path = format!("/api/organisations/{}/members", org.slug);

        let response = server
            .post(&path)
            .add_header("authorization", bearer(&founder))
            .json(&new_member("employee", "not-an-email"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["errors"]["email"][0], "Invalid email format");

        // Unknown enum values never reach the handler
        let response = server
            .post(&path)
            .add_header("authorization", bearer(&founder))
            .json(&new_member("owner", "owner@example.com"))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_hr_cannot_create_admin(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let (hr, _) = create_test_user_in_org(&pool, org.id, MemberRole::Hr).await;
        let (employee, _) = create_test_user_in_org(&pool, org.id, MemberRole::Employee).await;
        let (server, _) = create_test_server(pool);
        let path = format!("/api/organisations/{}/members", org.slug);

        server
            .post(&path)
            .add_header("authorization", bearer(&hr))
            .json(&new_member("admin", "boss@example.com"))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        server
            .post(&path)
            .add_header("authorization", bearer(&hr))
            .json(&new_member("employee", "worker@example.com"))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .post(&path)
            .add_header("authorization", bearer(&employee))
            .json(&new_member("employee", "friend@example.com"))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_member_access(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let (other_org, _) = create_test_organisation(&pool, &founder).await;
        let (employee, employee_member) = create_test_user_in_org(&pool, org.id, MemberRole::Employee).await;
        let (colleague, _) = create_test_user_in_org(&pool, org.id, MemberRole::Employee).await;
        let stranger = create_test_member(&pool, other_org.id, MemberRole::Employee, None).await;
        let (server, _) = create_test_server(pool);
        let path = format!("/api/organisations/{}/members/{}", org.slug, employee_member.id);

        let response = server.get(&path).add_header("authorization", bearer(&employee)).await;
        response.assert_status_ok();
        let member: MemberResponse = response.json();
        assert_eq!(member.id, employee_member.id);

        server.get(&path).add_header("authorization", bearer(&founder)).await.assert_status_ok();

        let response = server.get(&path).add_header("authorization", bearer(&colleague)).await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "You can only access your own profile or require admin/HR privileges");

        // A member of another organisation is not visible through this one
        for id in [stranger.id, Uuid::new_v4()] {
            let response = server
                .get(&format!("/api/organisations/{}/members/{}", org.slug, id))
                .add_header("authorization", bearer(&founder))
                .await;
            response.assert_status(StatusCode::NOT_FOUND);
            let body: serde_json::Value = response.json();
            assert_eq!(body["message"], "Member not found");
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_self_update_is_limited_to_name(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, _) = create_test_organisation(&pool, &founder).await;
        let (employee, member) = create_test_user_in_org(&pool, org.id, MemberRole::Employee).await;
        let (server, _) = create_test_server(pool);
        let path = format!("/api/organisations/{}/members/{}", org.slug, member.id);

        let response = server
            .patch(&path)
            .add_header("authorization", bearer(&employee))
            .json(&json!({"name": "Preferred Name", "role": "admin"}))
            .await;
        response.assert_status_ok();
        let updated: MemberResponse = response.json();
        assert_eq!(updated.name, "Preferred Name");
        assert_eq!(updated.role, MemberRole::Employee);
        assert_eq!(updated.dept, member.dept);

        let response = server
            .patch(&path)
            .add_header("authorization", bearer(&employee))
            .json(&json!({"dept": "Finance"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_and_hr_updates(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, founder_member) = create_test_organisation(&pool, &founder).await;
        let (hr, _) = create_test_user_in_org(&pool, org.id, MemberRole::Hr).await;
        let employee = create_test_member(&pool, org.id, MemberRole::Employee, None).await;
        let (server, _) = create_test_server(pool);
        let employee_path = format!("/api/organisations/{}/members/{}", org.slug, employee.id);

        let update = |role: &str, email: &str| {
            json!({
                "role": role,
                "name": "Updated",
                "email": email,
                "dept": null,
                "startDate": null,
                "status": "vacation",
                "country": "France"
            })
        };

        let response = server
            .patch(&employee_path)
            .add_header("authorization", bearer(&hr))
            .json(&update("hr", &employee.email))
            .await;
        response.assert_status_ok();
        let updated: MemberResponse = response.json();
        assert_eq!(updated.role, MemberRole::Hr);
        assert_eq!(updated.status, MemberStatus::Vacation);
        assert_eq!(updated.dept, None);
        assert_eq!(updated.country.as_deref(), Some("France"));

        // HR can neither promote to admin nor demote an admin
        server
            .patch(&employee_path)
            .add_header("authorization", bearer(&hr))
            .json(&update("admin", &employee.email))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .patch(&format!("/api/organisations/{}/members/{}", org.slug, founder_member.id))
            .add_header("authorization", bearer(&hr))
            .json(&update("employee", &founder_member.email))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        // Admins can
        server
            .patch(&employee_path)
            .add_header("authorization", bearer(&founder))
            .json(&update("admin", &employee.email))
            .await
            .assert_status_ok();

        // Taking another member's email within the organisation conflicts
        server
            .patch(&employee_path)
            .add_header("authorization", bearer(&founder))
            .json(&update("admin", &founder_member.email))
            .await
            .assert_status(StatusCode::CONFLICT);

        // Admin/HR must send the full schema
        server
            .patch(&employee_path)
            .add_header("authorization", bearer(&founder))
            .json(&json!({"name": "Only a name"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deactivate_member(pool: SqlitePool) {
        let founder = create_test_user(&pool, UserRole::User).await;
        let (org, founder_member) = create_test_organisation(&pool, &founder).await;
        let (hr, _) = create_test_user_in_org(&pool, org.id, MemberRole::Hr).await;
        let (employee, employee_member) = create_test_user_in_org(&pool, org.id, MemberRole::Employee).await;
        let (server, _) = create_test_server(pool);
        let employee_path = format!("/api/organisations/{}/members/{}", org.slug, employee_member.id);

        server
            .delete(&employee_path)
            .add_header("authorization", bearer(&hr))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let response = server
            .delete(&format!("/api/organisations/{}/members/{}", org.slug, founder_member.id))
            .add_header("authorization", bearer(&founder))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "You cannot deactivate your own membership");

        let response = server.delete(&employee_path).add_header("authorization", bearer(&founder)).await;
        response.assert_status_ok();
        let member: MemberResponse = response.json();
        assert_eq!(member.status, MemberStatus::Inactive);

        // Inactive members lose access to the organisation
        server
            .get(&format!("/api/organisations/{}", org.slug))
            .add_header("authorization", bearer(&employee))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_my_memberships(pool: SqlitePool) {
        let user = create_test_user(&pool, UserRole::User).await;
        let (first, _) = create_test_organisation(&pool, &user).await;
        let (second, _) = create_test_organisation(&pool, &user).await;
        let (server, _) = create_test_server(pool);

        let response = server.get("/api/members/me").add_header("authorization", bearer(&user)).await;
        response.assert_status_ok();
        let memberships: Vec<MembershipResponse> = response.json();
        assert_eq!(memberships.len(), 2);
        assert_eq!(memberships[0].org.slug, second.slug);
        assert_eq!(memberships[1].org.id, first.id);
        assert_eq!(memberships[0].member.role, MemberRole::Admin);

        server.get("/api/members/me").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
