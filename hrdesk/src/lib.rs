//! # hrdesk: multi-tenant HR backend
//!
//! `hrdesk` is a REST service for running organisations: their members, the user accounts those
//! members sign in with, and the documents (passports, contracts, tax forms, ...) HR keeps on file
//! for each member.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum) with SQLite for persistence
//! and an S3-compatible object store for document files.
//!
//! A request flows through:
//!
//! 1. **Extractors** ([`auth`]) resolve the caller from a session cookie or bearer token and, for
//!    organisation routes, the caller's active membership and role.
//! 2. **Handlers** ([`api::handlers`]) validate the request body and apply business rules such as
//!    "HR may not create admins".
//! 3. **Repositories** ([`db::handlers`]) run SQL against a borrowed connection or transaction.
//!
//! Document files never pass through the server. Clients receive presigned URLs from
//! [`storage`] and upload or download directly; the server verifies the uploaded object before
//! marking the document ready.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use hrdesk::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = hrdesk::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     hrdesk::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod storage;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::{
        handlers::{auth as auth_handlers, documents, members, organisations, users},
        models::users::UserRole,
    },
    auth::password,
    config::CorsOrigin,
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    openapi::ApiDoc,
    storage::ObjectStore,
    validation::normalize_email,
};
use axum::{
    Router,
    http::{self, HeaderValue, Method},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{DocumentId, MemberId, OrganisationId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .storage(object_store)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    /// Object store holding document files
    pub storage: Arc<dyn ObjectStore>,
}

/// Get the hrdesk database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial system admin if it doesn't exist.
///
/// Idempotent: an existing account with `email` is promoted to the `admin` role, and its password
/// replaced when one is given. Returns the admin's user ID.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, db: &SqlitePool) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(password) => {
            let password = password.to_string();
            Some(tokio::task::spawn_blocking(move || password::hash_string(&password)).await??)
        }
        None => None,
    };

    let email = normalize_email(email);
    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    let user = match user_repo.get_user_by_email(&email).await? {
        Some(existing) => {
            user_repo
                .update(
                    existing.id,
                    &UserUpdateDBRequest {
                        role: Some(UserRole::Admin),
                        password_hash,
                        ..Default::default()
                    },
                )
                .await?
        }
        None => {
            user_repo
                .create(&UserCreateDBRequest {
                    name: "Administrator".to_string(),
                    email,
                    role: UserRole::Admin,
                    password_hash,
                })
                .await?
        }
    };

    tx.commit().await?;
    Ok(user.id)
}

/// Connect to the configured database, run migrations and ensure the initial admin exists
async fn setup_database(config: &Config) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout)
        .connect_with(options)
        .await?;

    prepare_database(config, &pool).await?;
    Ok(pool)
}

async fn prepare_database(config: &Config, pool: &SqlitePool) -> anyhow::Result<()> {
    migrator().run(pool).await?;

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {e}"))?;

    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Origins never carry a path, so use the serialized origin rather than the URL
            CorsOrigin::Url(url) => url.origin().ascii_serialization().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware:
///
/// - `/api/auth/*`: session sign-up, sign-in and sign-out
/// - `/api/users/*`, `/api/members/me`, `/api/organisations/*`: the management API
/// - `/docs`: OpenAPI reference
/// - `/healthz`, and `/internal/metrics` when metrics are enabled
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/auth/sign-up/email", post(auth_handlers::sign_up))
        .route("/auth/sign-in/email", post(auth_handlers::sign_in))
        .route("/auth/sign-out", post(auth_handlers::sign_out))
        .route("/auth/get-session", get(auth_handlers::get_session));

    let document_routes = Router::new()
        .route("/", get(documents::list_documents))
        .route("/initiate", post(documents::initiate_upload))
        .route("/complete", post(documents::complete_upload))
        .route(
            "/{document_id}",
            get(documents::get_document)
                .put(documents::replace_document)
                .delete(documents::delete_document),
        );

    let api_routes = Router::new()
        // Users
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user).patch(users::update_user))
        // The caller's memberships
        .route("/members/me", get(members::list_my_memberships))
        // Organisations
        .route(
            "/organisations",
            get(organisations::list_organisations).post(organisations::create_organisation),
        )
        .route(
            "/organisations/{slug}",
            get(organisations::get_organisation)
                .patch(organisations::update_organisation)
                .delete(organisations::delete_organisation),
        )
        .route("/organisations/{slug}/settings", get(organisations::get_organisation_settings))
        // Members
        .route(
            "/organisations/{slug}/members",
            get(organisations::list_organisation_members).post(members::create_member),
        )
        .route(
            "/organisations/{slug}/members/{member_id}",
            get(members::get_member).patch(members::update_member).delete(members::deactivate_member),
        )
        // Documents
        .nest("/organisations/{slug}/members/{member_id}/documents", document_routes);

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", auth_routes.merge(api_routes))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// A configured server: database, object store and router
pub struct Application {
    router: Router,
    config: Config,
    pool: SqlitePool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application, reusing `pool` instead of connecting to `database_url` when given
    pub async fn new_with_pool(config: Config, pool: Option<SqlitePool>) -> anyhow::Result<Self> {
        debug!("Starting hrdesk with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => {
                prepare_database(&config, &pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let storage = storage::create_object_store(&config.storage).await?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .storage(storage)
            .build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("hrdesk listening on http://{}, available at http://localhost:{}", bind_addr, self.config.port);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
