//! API request/response models for organisations.

use super::members::{MemberHrView, MemberResponse, MemberSummary};
use crate::db::models::organisations::OrganisationDBResponse;
use crate::types::OrganisationId;
use crate::validation::{FieldErrors, is_valid_slug};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganisationCreate {
    pub name: String,
    /// URL identifier: lowercase letters and digits in dash-separated groups
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
}

impl OrganisationCreate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        check_organisation_fields(&self.name, &self.slug, self.country.as_deref(), self.address.as_deref())
    }
}

/// Replaces every editable field of an organisation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganisationUpdate {
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
}

impl OrganisationUpdate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        check_organisation_fields(&self.name, &self.slug, self.country.as_deref(), self.address.as_deref())
    }
}

fn check_organisation_fields(name: &str, slug: &str, country: Option<&str>, address: Option<&str>) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();
    errors.check_required("name", name, 255, "Name is required", "Name too long");
    errors.check_required("slug", slug, 100, "Slug is required", "Slug too long");
    if !slug.is_empty() && !is_valid_slug(&slug.to_lowercase()) {
        errors.add("slug", "Slug must contain only lowercase letters, numbers, and single hyphens");
    }
    errors.check_optional("country", country, 1, 100, "Country cannot be empty", "Country name too long");
    errors.check_optional("address", address, 0, 500, "", "Address too long");
    errors.into_result()
}

/// Complete organisation record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrganisationId,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrganisationDBResponse> for OrganisationResponse {
    fn from(db: OrganisationDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            slug: db.slug,
            country: db.country,
            address: db.address,
            plan: db.plan,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Organisation with every member record, for organisation admins
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganisationWithMembers {
    #[serde(flatten)]
    pub organisation: OrganisationResponse,
    pub members: Vec<MemberResponse>,
}

/// Organisation as seen by any of its active members
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationOverview {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrganisationId,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Active members only
    pub members: Vec<MemberSummary>,
}

impl OrganisationOverview {
    pub fn new(org: OrganisationDBResponse, members: Vec<MemberSummary>) -> Self {
        Self {
            id: org.id,
            name: org.name,
            slug: org.slug,
            country: org.country,
            address: org.address,
            created_at: org.created_at,
            members,
        }
    }
}

/// Organisation and member management fields, for HR
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationHrView {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrganisationId,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<MemberHrView>,
}

impl OrganisationHrView {
    pub fn new(org: OrganisationDBResponse, members: Vec<MemberHrView>) -> Self {
        Self {
            id: org.id,
            name: org.name,
            slug: org.slug,
            country: org.country,
            address: org.address,
            plan: org.plan,
            created_at: org.created_at,
            members,
        }
    }
}

/// Member listing, shaped by the caller's organisation role
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum OrganisationMembersResponse {
    Admin(OrganisationWithMembers),
    Hr(OrganisationHrView),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
