//! Database repository for organisation members.

use crate::types::{MemberId, OrganisationId, UserId, abbrev_uuid};
use crate::{
    api::models::members::{MemberRole, MemberStatus},
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::members::{MemberCreateDBRequest, MemberDBResponse, MemberUpdateDBRequest, MembershipDBResponse},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing the members of one organisation
#[derive(Debug, Clone)]
pub struct MemberFilter {
    pub org_id: OrganisationId,
    /// Only members with status `active`
    pub active_only: bool,
}

impl MemberFilter {
    pub fn new(org_id: OrganisationId) -> Self {
        Self { org_id, active_only: false }
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }
}

#[derive(Debug, Clone, FromRow)]
struct Member {
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

impl From<Member> for MemberDBResponse {
    fn from(m: Member) -> Self {
        Self {
            id: m.id,
            org_id: m.org_id,
            user_id: m.user_id,
            role: m.role,
            name: m.name,
            email: m.email,
            dept: m.dept,
            start_date: m.start_date,
            status: m.status,
            country: m.country,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Membership {
    #[sqlx(flatten)]
    pub member: Member,
    pub org_name: String,
    pub org_slug: String,
}

pub struct Members<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Members<'c> {
    type CreateRequest = MemberCreateDBRequest;
    type UpdateRequest = MemberUpdateDBRequest;
    type Response = MemberDBResponse;
    type Id = MemberId;
    type Filter = MemberFilter;

    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&request.org_id), role = ?request.role), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let member = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (id, org_id, user_id, role, name, email, dept, start_date, status, country, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.org_id)
        .bind(request.user_id)
        .bind(request.role)
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.dept)
        .bind(request.start_date)
        .bind(request.status)
        .bind(&request.country)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(member.into())
    }

    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(member.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(org_id = %abbrev_uuid(&filter.org_id), active_only = filter.active_only), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT * FROM members
            WHERE org_id = ? AND (? = 0 OR status = 'active')
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(filter.org_id)
        .bind(filter.active_only)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(members.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(member_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let member = sqlx::query_as::<_, Member>(
            r#"
            UPDATE members SET
                role = ?,
                name = ?,
                email = ?,
                dept = ?,
                start_date = ?,
                status = ?,
                country = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(request.role.unwrap_or(current.role))
        .bind(request.name.as_ref().unwrap_or(&current.name))
        .bind(request.email.as_ref().unwrap_or(&current.email))
        .bind(request.dept.as_ref().unwrap_or(&current.dept))
        .bind(request.start_date.unwrap_or(current.start_date))
        .bind(request.status.unwrap_or(current.status))
        .bind(request.country.as_ref().unwrap_or(&current.country))
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(member.into())
    }
}

impl<'c> Members<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Get a member only if it belongs to `org_id`
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), member_id = %abbrev_uuid(&id)), err)]
    pub async fn get_in_organisation(&mut self, org_id: OrganisationId, id: MemberId) -> Result<Option<MemberDBResponse>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = ? AND org_id = ?")
            .bind(id)
            .bind(org_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(member.map(Into::into))
    }

    /// The user's membership in `org_id`, if it is active
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&org_id), user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_active_membership(&mut self, org_id: OrganisationId, user_id: UserId) -> Result<Option<MemberDBResponse>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE org_id = ? AND user_id = ? AND status = 'active' ORDER BY created_at ASC LIMIT 1",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(member.map(Into::into))
    }

    /// Active memberships of a user across organisations, newest first
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_memberships(&mut self, user_id: UserId) -> Result<Vec<MembershipDBResponse>> {
        let rows = sqlx::query_as::<_, Membership>(
            r#"
            SELECT m.*, o.name AS org_name, o.slug AS org_slug
            FROM members m
            JOIN organisations o ON o.id = m.org_id
            WHERE m.user_id = ? AND m.status = 'active'
            ORDER BY m.created_at DESC, m.rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| MembershipDBResponse {
                member: row.member.into(),
                org_name: row.org_name,
                org_slug: row.org_slug,
            })
            .collect())
    }

    /// Link member records created for `email` before the account existed. Returns the number linked.
    #[instrument(skip(self, email), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn link_unclaimed_by_email(&mut self, email: &str, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("UPDATE members SET user_id = ?, updated_at = ? WHERE email = ? AND user_id IS NULL")
            .bind(user_id)
            .bind(Utc::now())
            .bind(email)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Mark a member inactive. The record is kept.
    #[instrument(skip(self), fields(member_id = %abbrev_uuid(&id)), err)]
    pub async fn deactivate(&mut self, id: MemberId) -> Result<MemberDBResponse> {
        self.update(
            id,
            &MemberUpdateDBRequest {
                status: Some(MemberStatus::Inactive),
                ..Default::default()
            },
        )
        .await
    }
}
