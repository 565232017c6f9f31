//! Database request and response models.
//!
//! Each entity has a `*CreateDBRequest`, a `*UpdateDBRequest` and a `*DBResponse`. API models in
//! [`crate::api::models`] convert into the requests and out of the responses.

pub mod documents;
pub mod members;
pub mod organisations;
pub mod users;
