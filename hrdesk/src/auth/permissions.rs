//! Role checks as extractors.
//!
//! - [`RequiresSystemAdmin`]: the caller's global role is `admin`
//! - [`OrgAccess<R>`]: the caller is an active member of the organisation named by the `{slug}`
//!   path parameter, and their membership satisfies rule `R`
//!
//! Rules are marker types in [`rule`], e.g. `OrgAccess<rule::AdminOrHr>`.

use std::{collections::HashMap, marker::PhantomData};

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use tracing::{instrument, trace};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{members::MemberRole, users::CurrentUser},
    db::{
        errors::DbError,
        handlers::{Members, Organisations},
        models::{members::MemberDBResponse, organisations::OrganisationDBResponse},
    },
    errors::{Error, Result},
    types::{MemberId, OrganisationId},
};

/// The authenticated caller, who must hold the global `admin` role
#[derive(Debug, Clone)]
pub struct RequiresSystemAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequiresSystemAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_system_admin() {
            return Err(Error::InsufficientPermissions {
                message: "System admin access required".to_string(),
            });
        }
        Ok(Self(user))
    }
}

/// A membership requirement applied after the caller's active membership is resolved
pub trait AccessRule: Send + Sync + 'static {
    /// `target` is the `{member_id}` path parameter, when the route has one
    fn check(membership: &MemberDBResponse, target: Option<MemberId>) -> Result<()>;

    /// Rejection message for callers with no active membership
    fn non_member_message() -> &'static str {
        "You are not a member of this organisation"
    }
}

pub mod rule {
    use super::*;

    /// Any active member
    pub struct AnyMember;

    /// Organisation admins
    pub struct Admin;

    /// Organisation admins and HR
    pub struct AdminOrHr;

    /// Organisation admins and HR, or the member named by `{member_id}` themselves
    pub struct AdminOrHrOrSelf;

    impl AccessRule for AnyMember {
        fn check(_: &MemberDBResponse, _: Option<MemberId>) -> Result<()> {
            Ok(())
        }
    }

    impl AccessRule for Admin {
        fn check(membership: &MemberDBResponse, _: Option<MemberId>) -> Result<()> {
            if membership.role == MemberRole::Admin {
                Ok(())
            } else {
                Err(Error::InsufficientPermissions {
                    message: Self::non_member_message().to_string(),
                })
            }
        }

        fn non_member_message() -> &'static str {
            "Admin access required for this organisation"
        }
    }

    impl AccessRule for AdminOrHr {
        fn check(membership: &MemberDBResponse, _: Option<MemberId>) -> Result<()> {
            if membership.role.is_admin_or_hr() {
                Ok(())
            } else {
                Err(Error::InsufficientPermissions {
                    message: "Admin or HR access required for this organisation".to_string(),
                })
            }
        }
    }

    impl AccessRule for AdminOrHrOrSelf {
        fn check(membership: &MemberDBResponse, target: Option<MemberId>) -> Result<()> {
            if membership.role.is_admin_or_hr() || target == Some(membership.id) {
                Ok(())
            } else {
                Err(Error::InsufficientPermissions {
                    message: "You can only access your own profile or require admin/HR privileges".to_string(),
                })
            }
        }
    }
}

/// The caller's access to one organisation, checked against rule `R`
pub struct OrgAccess<R> {
    pub user: CurrentUser,
    pub organisation: OrganisationDBResponse,
    /// The caller's own active member record in the organisation
    pub membership: MemberDBResponse,
    _rule: PhantomData<fn() -> R>,
}

impl<R> OrgAccess<R> {
    pub fn organisation_id(&self) -> OrganisationId {
        self.organisation.id
    }

    /// Whether the caller holds the admin or HR role, as opposed to acting on their own record
    pub fn is_admin_or_hr(&self) -> bool {
        self.membership.role.is_admin_or_hr()
    }

    pub fn is_admin(&self) -> bool {
        self.membership.role == MemberRole::Admin
    }
}

impl<R: AccessRule> FromRequestParts<AppState> for OrgAccess<R> {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| Error::BadRequest { message: e.body_text() })?;
        let slug = params.get("slug").ok_or_else(|| Error::Internal {
            operation: "resolve organisation: route has no {slug} parameter".to_string(),
        })?;
        let target = params
            .get("member_id")
            .map(|id| Uuid::parse_str(id))
            .transpose()
            .map_err(|_| Error::BadRequest {
                message: "Invalid member ID".to_string(),
            })?;

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;

        let organisation = Organisations::new(&mut conn)
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "Organisation".to_string(),
                id: slug.clone(),
            })?;

        let membership = Members::new(&mut conn)
            .get_active_membership(organisation.id, user.id)
            .await?
            .ok_or_else(|| Error::InsufficientPermissions {
                message: R::non_member_message().to_string(),
            })?;

        R::check(&membership, target)?;
        trace!(org = %organisation.slug, role = ?membership.role, "Organisation access granted");

        Ok(Self {
            user,
            organisation,
            membership,
            _rule: PhantomData,
        })
    }
}
