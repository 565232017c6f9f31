//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLite connection (pooled or transactional), binds parameters
//! for its table and returns models from [`crate::db::models`]:
//!
//! - [`Users`]: global accounts and credential lookup
//! - [`Organisations`]: tenants, including atomic creation with the founding admin member
//! - [`Members`]: organisation-scoped people, membership lookups and account linking
//! - [`Documents`]: document metadata and its guarded status transitions

pub mod documents;
pub mod members;
pub mod organisations;
pub mod repository;
pub mod users;

pub use documents::Documents;
pub use members::Members;
pub use organisations::Organisations;
pub use repository::Repository;
pub use users::Users;
