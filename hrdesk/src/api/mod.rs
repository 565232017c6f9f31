//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Every route lives under `/api`:
//!
//! - **Authentication** (`/auth/*`): sign-up, sign-in, sign-out and the current session
//! - **Users** (`/users/*`): global accounts
//! - **Organisations** (`/organisations/*`): tenants, their settings and member listings
//! - **Members** (`/organisations/{slug}/members/*`, `/members/me`): organisation-scoped people
//! - **Documents** (`/organisations/{slug}/members/{member_id}/documents/*`): presigned uploads
//!   and downloads of member documents
//!
//! # OpenAPI Documentation
//!
//! All endpoints are annotated with `utoipa`; the reference is served at `/docs`.

pub mod handlers;
pub mod models;
