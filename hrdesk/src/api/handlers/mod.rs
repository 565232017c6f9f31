//! HTTP request handlers for all API endpoints.
//!
//! Handlers take their caller from an extractor ([`crate::api::models::users::CurrentUser`],
//! [`crate::auth::permissions::RequiresSystemAdmin`] or
//! [`crate::auth::permissions::OrgAccess`]), validate the body, and call the repositories in
//! [`crate::db::handlers`].

pub mod auth;
pub mod documents;
pub mod members;
pub mod organisations;
pub mod users;
