//! Authentication and authorization.
//!
//! Callers authenticate with a JWT session issued at sign-in, sent either as the session cookie
//! or as an `Authorization: Bearer <token>` header. Authorization happens in extractors, so a
//! handler's signature states who may call it:
//!
//! ```ignore
//! async fn update_organisation(
//!     State(state): State<AppState>,
//!     access: OrgAccess<Admin>,
//!     Json(request): Json<OrganisationUpdate>,
//! ) -> Result<Json<OrganisationWithMembers>> { ... }
//! ```
//!
//! # Modules
//!
//! - [`current_user`]: resolves the [`CurrentUser`](crate::api::models::users::CurrentUser) from the request
//! - [`password`]: Argon2 hashing and verification
//! - [`permissions`]: system-admin and organisation role extractors
//! - [`session`]: session token and cookie handling

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
