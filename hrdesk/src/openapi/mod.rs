//! OpenAPI documentation for the `/api` surface, served at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Session cookie and bearer token schemes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "SessionCookie".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "hrdesk_session",
                    "Session token set by sign-in and sign-up. The cookie name is configurable.",
                ))),
            );
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "The session token, for clients that cannot hold cookies:\n\n\
                            ```\nAuthorization: Bearer SESSION_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "hrdesk API")
    ),
    modifiers(&SecurityAddon),
    security(
        ("SessionCookie" = []),
        ("BearerAuth" = [])
    ),
    paths(
        api::handlers::auth::sign_up,
        api::handlers::auth::sign_in,
        api::handlers::auth::sign_out,
        api::handlers::auth::get_session,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::organisations::list_organisations,
        api::handlers::organisations::create_organisation,
        api::handlers::organisations::get_organisation,
        api::handlers::organisations::update_organisation,
        api::handlers::organisations::delete_organisation,
        api::handlers::organisations::get_organisation_settings,
        api::handlers::organisations::list_organisation_members,
        api::handlers::members::list_my_memberships,
        api::handlers::members::create_member,
        api::handlers::members::get_member,
        api::handlers::members::update_member,
        api::handlers::members::deactivate_member,
        api::handlers::documents::initiate_upload,
        api::handlers::documents::complete_upload,
        api::handlers::documents::list_documents,
        api::handlers::documents::get_document,
        api::handlers::documents::replace_document,
        api::handlers::documents::delete_document,
    ),
    components(
        schemas(
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::AuthResponse,
            api::models::auth::SessionResponse,
            api::models::auth::AuthSuccessResponse,
            api::models::users::UserRole,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::organisations::OrganisationCreate,
            api::models::organisations::OrganisationUpdate,
            api::models::organisations::OrganisationResponse,
            api::models::organisations::OrganisationWithMembers,
            api::models::organisations::OrganisationOverview,
            api::models::organisations::OrganisationHrView,
            api::models::organisations::OrganisationMembersResponse,
            api::models::organisations::MessageResponse,
            api::models::members::MemberRole,
            api::models::members::MemberStatus,
            api::models::members::MemberCreate,
            api::models::members::MemberUpdate,
            api::models::members::MemberSelfUpdate,
            api::models::members::MemberResponse,
            api::models::members::MemberSummary,
            api::models::members::MemberHrView,
            api::models::members::MembershipOrganisation,
            api::models::members::MembershipResponse,
            api::models::documents::DocumentStatus,
            api::models::documents::DocumentType,
            api::models::documents::DocumentFileType,
            api::models::documents::DocumentUploadRequest,
            api::models::documents::UploadUrlResponse,
            api::models::documents::CompleteUploadRequest,
            api::models::documents::OkResponse,
            api::models::documents::DocumentResponse,
            api::models::documents::DocumentDownloadResponse,
        )
    ),
    tags(
        (name = "auth", description = "Email and password sessions"),
        (name = "users", description = "Global user accounts"),
        (name = "organisations", description = "Organisations and their settings"),
        (name = "members", description = "Organisation members"),
        (name = "documents", description = "Member documents stored in object storage"),
    ),
    info(
        title = "hrdesk API",
        description = "Multi-tenant HR backend: organisations, members and their documents.",
    )
)]
pub struct ApiDoc;
