//! API request and response models.
//!
//! Request models deserialize the JSON body and carry a `validate` method returning every failing
//! field at once. Response models convert from the database models in [`crate::db::models`].
//! JSON field names are camelCase.

pub mod auth;
pub mod documents;
pub mod members;
pub mod organisations;
pub mod pagination;
pub mod users;
