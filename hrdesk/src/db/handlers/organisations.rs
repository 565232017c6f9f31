//! Database repository for organisations.

use crate::types::{OrganisationId, abbrev_uuid};
use crate::{
    api::models::members::{MemberRole, MemberStatus},
    db::{
        errors::{DbError, Result},
        handlers::{members::Members, repository::Repository},
        models::{
            members::{MemberCreateDBRequest, MemberDBResponse},
            organisations::{OrganisationCreateDBRequest, OrganisationDBResponse, OrganisationFounder, OrganisationUpdateDBRequest},
        },
    },
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing organisations
#[derive(Debug, Clone)]
pub struct OrganisationFilter {
    pub skip: i64,
    pub limit: i64,
}

impl OrganisationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

#[derive(Debug, Clone, FromRow)]
struct Organisation {
    pub id: OrganisationId,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    pub address: Option<String>,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Organisation> for OrganisationDBResponse {
    fn from(org: Organisation) -> Self {
        Self {
            id: org.id,
            name: org.name,
            slug: org.slug,
            country: org.country,
            address: org.address,
            plan: org.plan,
            created_at: org.created_at,
            updated_at: org.updated_at,
        }
    }
}

pub struct Organisations<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Organisations<'c> {
    type CreateRequest = OrganisationCreateDBRequest;
    type UpdateRequest = OrganisationUpdateDBRequest;
    type Response = OrganisationDBResponse;
    type Id = OrganisationId;
    type Filter = OrganisationFilter;

    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let org = sqlx::query_as::<_, Organisation>(
            r#"
            INSERT INTO organisations (id, name, slug, country, address, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.slug)
        .bind(&request.country)
        .bind(&request.address)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(org.into())
    }

    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let org = sqlx::query_as::<_, Organisation>("SELECT * FROM organisations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(org.map(Into::into))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let orgs = sqlx::query_as::<_, Organisation>("SELECT * FROM organisations ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?")
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(orgs.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(org_id = %abbrev_uuid(&id), slug = %request.slug), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let org = sqlx::query_as::<_, Organisation>(
            r#"
            UPDATE organisations SET
                name = ?,
                slug = ?,
                country = ?,
                address = ?,
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.slug)
        .bind(&request.country)
        .bind(&request.address)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(org.into())
    }
}

impl<'c> Organisations<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// Create an organisation together with its founder as an active admin member.
    ///
    /// Both rows are written in one transaction; a slug conflict leaves nothing behind.
    #[instrument(skip(self, request, founder), fields(slug = %request.slug, user_id = %abbrev_uuid(&founder.user_id)), err)]
    pub async fn create_with_admin(
        &mut self,
        request: &OrganisationCreateDBRequest,
        founder: &OrganisationFounder,
    ) -> Result<(OrganisationDBResponse, MemberDBResponse)> {
        let mut tx = self.db.begin().await?;

        let org = Organisations::new(&mut tx).create(request).await?;
        let admin = Members::new(&mut tx)
            .create(&MemberCreateDBRequest {
                org_id: org.id,
                user_id: Some(founder.user_id),
                role: MemberRole::Admin,
                name: founder.name.clone(),
                email: founder.email.clone(),
                dept: None,
                start_date: None,
                status: MemberStatus::Active,
                country: None,
            })
            .await?;

        tx.commit().await?;
        Ok((org, admin))
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_slug(&mut self, slug: &str) -> Result<Option<OrganisationDBResponse>> {
        let org = sqlx::query_as::<_, Organisation>("SELECT * FROM organisations WHERE slug = ?")
            .bind(slug.to_lowercase())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(org.map(Into::into))
    }

    /// Delete an organisation. Its members and documents are removed by cascade.
    #[instrument(skip(self), fields(org_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: OrganisationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM organisations WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
