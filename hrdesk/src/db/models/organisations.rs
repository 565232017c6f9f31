//! Database models for organisations.

use crate::api::models::organisations::{OrganisationCreate, OrganisationUpdate};
use crate::types::{OrganisationId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new organisation
#[derive(Debug, Clone)]
pub struct OrganisationCreateDBRequest {
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
}

impl From<OrganisationCreate> for OrganisationCreateDBRequest {
    fn from(api: OrganisationCreate) -> Self {
        Self {
            name: api.name,
            slug: api.slug.to_lowercase(),
            country: api.country,
            address: api.address,
        }
    }
}

/// Database request for updating an organisation. Updates replace every editable field.
#[derive(Debug, Clone)]
pub struct OrganisationUpdateDBRequest {
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
}

impl From<OrganisationUpdate> for OrganisationUpdateDBRequest {
    fn from(api: OrganisationUpdate) -> Self {
        Self {
            name: api.name,
            slug: api.slug.to_lowercase(),
            country: api.country,
            address: api.address,
        }
    }
}

/// The user who becomes the first admin member of a new organisation
#[derive(Debug, Clone)]
pub struct OrganisationFounder {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// Database response for an organisation
#[derive(Debug, Clone)]
pub struct OrganisationDBResponse {
    pub id: OrganisationId,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
