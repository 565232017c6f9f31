//! Database models for organisation members.

use crate::api::models::members::{MemberCreate, MemberRole, MemberStatus, MemberUpdate};
use crate::types::{MemberId, OrganisationId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new member
#[derive(Debug, Clone)]
pub struct MemberCreateDBRequest {
    pub org_id: OrganisationId,
    pub user_id: Option<UserId>,
    pub role: MemberRole,
    pub name: String,
    pub email: String,
    pub dept: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub status: MemberStatus,
    pub country: Option<String>,
}

impl MemberCreateDBRequest {
    pub fn new(org_id: OrganisationId, api: MemberCreate) -> Self {
        Self {
            org_id,
            user_id: api.user_id,
            role: api.role,
            name: api.name,
            email: api.email,
            dept: api.dept,
            start_date: api.start_date,
            status: api.status,
            country: api.country,
        }
    }
}

/// Database request for updating a member.
///
/// `None` keeps the stored value; nullable columns use `Some(None)` to clear.
#[derive(Debug, Clone, Default)]
pub struct MemberUpdateDBRequest {
    pub role: Option<MemberRole>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub dept: Option<Option<String>>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub status: Option<MemberStatus>,
    pub country: Option<Option<String>>,
}

impl From<MemberUpdate> for MemberUpdateDBRequest {
    fn from(api: MemberUpdate) -> Self {
        Self {
            role: Some(api.role),
            name: Some(api.name),
            email: Some(api.email),
            dept: Some(api.dept),
            start_date: Some(api.start_date),
            status: Some(api.status),
            country: Some(api.country),
        }
    }
}

/// Database response for a member
#[derive(Debug, Clone)]
pub struct MemberDBResponse {
    pub id: MemberId,
    pub org_id: OrganisationId,
    pub user_id: Option<UserId>,
    pub role: MemberRole,
    pub name: String,
    pub email: String,
    pub dept: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub status: MemberStatus,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An active membership together with the organisation it belongs to
#[derive(Debug, Clone)]
pub struct MembershipDBResponse {
    pub member: MemberDBResponse,
    pub org_name: String,
    pub org_slug: String,
}
