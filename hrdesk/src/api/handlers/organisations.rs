use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use sqlx::SqliteConnection;
use tracing::info;

use crate::{
    AppState,
    api::models::{
        members::{MemberHrView, MemberResponse, MemberSummary},
        organisations::{
            MessageResponse, OrganisationCreate, OrganisationHrView, OrganisationMembersResponse, OrganisationOverview,
            OrganisationResponse, OrganisationUpdate, OrganisationWithMembers,
        },
        pagination::Pagination,
        users::CurrentUser,
    },
    auth::permissions::{OrgAccess, RequiresSystemAdmin, rule},
    db::{
        handlers::{Members, Organisations, Repository, members::MemberFilter, organisations::OrganisationFilter},
        models::organisations::{OrganisationCreateDBRequest, OrganisationDBResponse, OrganisationFounder, OrganisationUpdateDBRequest},
    },
    errors::{Error, Result},
};

/// The organisation with every member record, active or not
async fn with_all_members(conn: &mut SqliteConnection, org: OrganisationDBResponse) -> Result<OrganisationWithMembers> {
    let members = Members::new(conn).list(&MemberFilter::new(org.id)).await?;
    Ok(OrganisationWithMembers {
        organisation: org.into(),
        members: members.into_iter().map(MemberResponse::from).collect(),
    })
}

/// List all organisations, newest first
#[utoipa::path(
    get,
    path = "/organisations",
    tag = "organisations",
    params(Pagination),
    responses(
        (status = 200, description = "Organisations", body = [OrganisationResponse]),
        (status = 403, description = "System admin access required"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_organisations(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _: RequiresSystemAdmin,
) -> Result<Json<Vec<OrganisationResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let orgs = Organisations::new(&mut conn)
        .list(&OrganisationFilter::new(pagination.skip(), pagination.limit()))
        .await?;

    Ok(Json(orgs.into_iter().map(OrganisationResponse::from).collect()))
}

/// Create an organisation. The caller becomes its first admin.
#[utoipa::path(
    post,
    path = "/organisations",
    tag = "organisations",
    request_body = OrganisationCreate,
    responses(
        (status = 201, description = "Organisation created", body = OrganisationWithMembers),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Slug already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_organisation(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<OrganisationCreate>,
) -> Result<(StatusCode, Json<OrganisationWithMembers>)> {
    create.validate()?;

    let founder = OrganisationFounder {
        user_id: current_user.id,
        name: current_user.name,
        email: current_user.email,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let (org, admin) = Organisations::new(&mut conn)
        .create_with_admin(&OrganisationCreateDBRequest::from(create), &founder)
        .await?;
    info!(org_id = %org.id, slug = %org.slug, "Created organisation");

    Ok((
        StatusCode::CREATED,
        Json(OrganisationWithMembers {
            organisation: org.into(),
            members: vec![admin.into()],
        }),
    ))
}

/// Get an organisation and its active members
#[utoipa::path(
    get,
    path = "/organisations/{slug}",
    tag = "organisations",
    params(("slug" = String, Path, description = "Organisation slug")),
    responses(
        (status = 200, description = "The organisation", body = OrganisationOverview),
        (status = 403, description = "Not a member of this organisation"),
        (status = 404, description = "Organisation not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_organisation(State(state): State<AppState>, access: OrgAccess<rule::AnyMember>) -> Result<Json<OrganisationOverview>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let members = Members::new(&mut conn)
        .list(&MemberFilter::new(access.organisation_id()).active_only())
        .await?;

    Ok(Json(OrganisationOverview::new(
        access.organisation,
        members.into_iter().map(MemberSummary::from).collect(),
    )))
}

/// Replace an organisation's details
#[utoipa::path(
    patch,
    path = "/organisations/{slug}",
    tag = "organisations",
    request_body = OrganisationUpdate,
    params(("slug" = String, Path, description = "Organisation slug")),
    responses(
        (status = 200, description = "Updated organisation", body = OrganisationWithMembers),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin access required for this organisation"),
        (status = 409, description = "Slug already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_organisation(
    State(state): State<AppState>,
    access: OrgAccess<rule::Admin>,
    Json(update): Json<OrganisationUpdate>,
) -> Result<Json<OrganisationWithMembers>> {
    update.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let org = Organisations::new(&mut conn)
        .update(access.organisation_id(), &OrganisationUpdateDBRequest::from(update))
        .await?;

    Ok(Json(with_all_members(&mut conn, org).await?))
}

/// Delete an organisation with all its members and documents
#[utoipa::path(
    delete,
    path = "/organisations/{slug}",
    tag = "organisations",
    params(("slug" = String, Path, description = "Organisation slug")),
    responses(
        (status = 200, description = "Organisation deleted", body = MessageResponse),
        (status = 403, description = "Admin access required for this organisation"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_organisation(State(state): State<AppState>, access: OrgAccess<rule::Admin>) -> Result<Json<MessageResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Organisations::new(&mut conn).delete(access.organisation_id()).await? {
        return Err(Error::NotFound {
            resource: "Organisation".to_string(),
            id: access.organisation.slug,
        });
    }
    info!(org_id = %access.organisation_id(), deleted_by = %access.user.id, "Deleted organisation");

    Ok(Json(MessageResponse {
        message: "Organisation deleted successfully".to_string(),
    }))
}

/// Get the full organisation record with every member, for its admins
#[utoipa::path(
    get,
    path = "/organisations/{slug}/settings",
    tag = "organisations",
    params(("slug" = String, Path, description = "Organisation slug")),
    responses(
        (status = 200, description = "Organisation settings", body = OrganisationWithMembers),
        (status = 403, description = "Admin access required for this organisation"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_organisation_settings(
    State(state): State<AppState>,
    access: OrgAccess<rule::Admin>,
) -> Result<Json<OrganisationWithMembers>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(with_all_members(&mut conn, access.organisation).await?))
}

/// List an organisation's members.
///
/// Admins see full records; HR sees the fields needed to manage people.
#[utoipa::path(
    get,
    path = "/organisations/{slug}/members",
    tag = "members",
    params(("slug" = String, Path, description = "Organisation slug")),
    responses(
        (status = 200, description = "Organisation and members", body = OrganisationMembersResponse),
        (status = 403, description = "Admin or HR access required for this organisation"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_organisation_members(
    State(state): State<AppState>,
    access: OrgAccess<rule::AdminOrHr>,
) -> Result<Json<OrganisationMembersResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if access.is_admin() {
        let org = with_all_members(&mut conn, access.organisation).await?;
        return Ok(Json(OrganisationMembersResponse::Admin(org)));
    }

    let members = Members::new(&mut conn).list(&MemberFilter::new(access.organisation_id())).await?;
    Ok(Json(OrganisationMembersResponse::Hr(OrganisationHrView::new(
        access.organisation,
        members.into_iter().map(MemberHrView::from).collect(),
    ))))
}
