//! Test fixtures: configuration, application state, and seeded users, organisations and members.

use std::sync::Arc;

use axum_test::TestServer;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        members::{MemberRole, MemberStatus},
        users::{CurrentUser, UserRole},
    },
    auth::session,
    config::{Config, StorageBackend, StorageConfig},
    db::{
        handlers::{Members, Organisations, Repository, Users},
        models::{
            members::{MemberCreateDBRequest, MemberDBResponse},
            organisations::{OrganisationCreateDBRequest, OrganisationDBResponse, OrganisationFounder},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    storage::MemoryObjectStore,
    types::{OrganisationId, UserId},
};

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            bucket: "test-documents".to_string(),
            ..Default::default()
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    }
}

pub fn create_test_app_state(pool: SqlitePool) -> AppState {
    create_test_app_state_with_store(pool).0
}

/// App state whose object store is returned too, so tests can simulate client uploads
pub fn create_test_app_state_with_store(pool: SqlitePool) -> (AppState, Arc<MemoryObjectStore>) {
    let store = Arc::new(MemoryObjectStore::new("test-documents"));
    let state = AppState::builder()
        .db(pool)
        .config(create_test_config())
        .storage(store.clone())
        .build();
    (state, store)
}

/// Server over the full router, with the memory object store it uses
pub fn create_test_server(pool: SqlitePool) -> (TestServer, Arc<MemoryObjectStore>) {
    let (state, store) = create_test_app_state_with_store(pool);
    let router = crate::build_router(&state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, store)
}

pub async fn create_test_user(pool: &SqlitePool, role: UserRole) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let suffix = Uuid::new_v4().simple().to_string();

    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            name: format!("Test User {}", &suffix[..8]),
            email: format!("testuser_{suffix}@example.com"),
            role,
            password_hash: None,
        })
        .await
        .expect("Failed to create test user")
}

/// An organisation founded by `founder`, together with the founder's admin membership
pub async fn create_test_organisation(pool: &SqlitePool, founder: &UserDBResponse) -> (OrganisationDBResponse, MemberDBResponse) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let slug = format!("org-{}", &Uuid::new_v4().simple().to_string()[..12]);

    Organisations::new(&mut conn)
        .create_with_admin(
            &OrganisationCreateDBRequest {
                name: "Test Organisation".to_string(),
                slug,
                country: Some("Ireland".to_string()),
                address: None,
            },
            &OrganisationFounder {
                user_id: founder.id,
                name: founder.name.clone(),
                email: founder.email.clone(),
            },
        )
        .await
        .expect("Failed to create test organisation")
}

/// An active member with the given role, linked to `user` when one is given
pub async fn create_test_member(pool: &SqlitePool, org_id: OrganisationId, role: MemberRole, user: Option<&UserDBResponse>) -> MemberDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let (user_id, name, email): (Option<UserId>, String, String) = match user {
        Some(user) => (Some(user.id), user.name.clone(), user.email.clone()),
        None => {
            let suffix = Uuid::new_v4().simple().to_string();
            (None, format!("Member {}", &suffix[..8]), format!("member_{suffix}@example.com"))
        }
    };

    Members::new(&mut conn)
        .create(&MemberCreateDBRequest {
            org_id,
            user_id,
            role,
            name,
            email,
            dept: Some("Operations".to_string()),
            start_date: None,
            status: MemberStatus::Active,
            country: None,
        })
        .await
        .expect("Failed to create test member")
}

/// A user with an active membership of `role` in `org_id`
pub async fn create_test_user_in_org(pool: &SqlitePool, org_id: OrganisationId, role: MemberRole) -> (UserDBResponse, MemberDBResponse) {
    let user = create_test_user(pool, UserRole::User).await;
    let member = create_test_member(pool, org_id, role, Some(&user)).await;
    (user, member)
}

/// `Authorization` header value carrying a session token for `user`
pub fn bearer(user: &UserDBResponse) -> String {
    let current_user = CurrentUser::from(user.clone());
    let token = session::create_session_token(&current_user, &create_test_config()).expect("Failed to create session token");
    format!("Bearer {token}")
}
