//! API request/response models for organisation members.

use crate::db::models::members::{MemberDBResponse, MembershipDBResponse};
use crate::types::{MemberId, OrganisationId, UserId};
use crate::validation::FieldErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role of a member within one organisation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Hr,
    Employee,
}

impl MemberRole {
    pub fn is_admin_or_hr(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Hr)
    }
}

/// Employment status of a member. Only `active` members can act within the organisation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Active,
    Vacation,
    PaidLeave,
    Inactive,
    Terminated,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberCreate {
    /// Existing account to link; members are otherwise linked when an account with the same email signs up
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub role: MemberRole,
    pub name: String,
    #[serde(deserialize_with = "crate::validation::deserialize_email")]
    pub email: String,
    pub dept: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub status: MemberStatus,
    pub country: Option<String>,
}

impl MemberCreate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_member_fields(&mut errors, &self.name, &self.email, self.dept.as_deref(), self.country.as_deref());
        errors.into_result()
    }
}

/// Full member update, available to organisation admins and HR
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdate {
    pub role: MemberRole,
    pub name: String,
    #[serde(deserialize_with = "crate::validation::deserialize_email")]
    pub email: String,
    pub dept: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub status: MemberStatus,
    pub country: Option<String>,
}

impl MemberUpdate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        check_member_fields(&mut errors, &self.name, &self.email, self.dept.as_deref(), self.country.as_deref());
        errors.into_result()
    }
}

/// Update a member may apply to their own record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberSelfUpdate {
    pub name: String,
}

impl MemberSelfUpdate {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        errors.check_required("name", &self.name, 255, "Name is required", "Name too long");
        errors.into_result()
    }
}

fn check_member_fields(errors: &mut FieldErrors, name: &str, email: &str, dept: Option<&str>, country: Option<&str>) {
    errors.check_required("name", name, 255, "Name is required", "Name too long");
    errors.check_email("email", email, 320);
    errors.check_optional("dept", dept, 0, 100, "", "Department name too long");
    errors.check_optional("country", country, 0, 100, "", "Country name too long");
}

/// Complete member record, as seen by organisation admins
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MemberId,
    #[schema(value_type = String, format = "uuid")]
    pub org_id: OrganisationId,
    #[schema(value_type = Option<String>, format = "uuid")]
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

impl From<MemberDBResponse> for MemberResponse {
    fn from(db: MemberDBResponse) -> Self {
        Self {
            id: db.id,
            org_id: db.org_id,
            user_id: db.user_id,
            role: db.role,
            name: db.name,
            email: db.email,
            dept: db.dept,
            start_date: db.start_date,
            status: db.status,
            country: db.country,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Member fields visible to every member of the organisation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub dept: Option<String>,
}

impl From<MemberDBResponse> for MemberSummary {
    fn from(db: MemberDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            role: db.role,
            dept: db.dept,
        }
    }
}

/// Member fields HR needs to manage people, without account linkage
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberHrView {
    #[schema(value_type = String, format = "uuid")]
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
    pub dept: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub status: MemberStatus,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MemberDBResponse> for MemberHrView {
    fn from(db: MemberDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            role: db.role,
            dept: db.dept,
            start_date: db.start_date,
            status: db.status,
            country: db.country,
            created_at: db.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipOrganisation {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrganisationId,
    pub name: String,
    pub slug: String,
}

/// One of the caller's active memberships
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MembershipResponse {
    #[serde(flatten)]
    pub member: MemberResponse,
    pub org: MembershipOrganisation,
}

impl From<MembershipDBResponse> for MembershipResponse {
    fn from(db: MembershipDBResponse) -> Self {
        let org = MembershipOrganisation {
            id: db.member.org_id,
            name: db.org_name,
            slug: db.org_slug,
        };
        Self {
            member: db.member.into(),
            org,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_create_deserializes_camel_case() {
        let create: MemberCreate = serde_json::from_value(json!({
            "role": "hr",
            "name": "Grace",
            "email": "grace@example.com",
            "startDate": "2024-03-01T00:00:00Z",
            "status": "paid_leave"
        }))
        .unwrap();

        assert_eq!(create.role, MemberRole::Hr);
        assert_eq!(create.status, MemberStatus::PaidLeave);
        assert!(create.start_date.is_some());
        assert!(create.user_id.is_none());
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_value::<MemberCreate>(json!({
            "role": "owner",
            "name": "Grace",
            "email": "grace@example.com",
            "status": "active"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_member_validation_reports_all_fields() {
        let update = MemberUpdate {
            role: MemberRole::Employee,
            name: "x".repeat(256),
            email: "not-an-email".to_string(),
            dept: Some("d".repeat(101)),
            start_date: None,
            status: MemberStatus::Active,
            country: None,
        };
        let errors = update.validate().unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["dept", "email", "name"]);
        assert_eq!(errors.messages("name"), ["Name too long"]);
    }
}
