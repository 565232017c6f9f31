use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        auth::{
            AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, RegisterRequest, RegisterResponse,
            SessionResponse, WithSessionCookie,
        },
        users::{CurrentUser, UserResponse, UserRole},
    },
    auth::{password, session},
    db::{
        handlers::{Members, Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::Error,
};

fn ensure_native_auth(state: &AppState) -> Result<(), Error> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    Ok(())
}

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Register a new account with email and password.
///
/// Member records already created for the same email are linked to the new account.
#[utoipa::path(
    post,
    path = "/auth/sign-up/email",
    request_body = RegisterRequest,
    tag = "auth",
    security(()),
    responses(
        (status = 201, description = "Account created and session started", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "An account with this email already exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_up(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<RegisterResponse, Error> {
    ensure_native_auth(&state)?;
    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }
    request.validate(&state.config.auth.native.password)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Users::new(&mut tx).get_user_by_email(&request.email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    // Hash the password on a blocking thread to avoid blocking async runtime
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let created_user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            name: request.name,
            email: request.email,
            role: UserRole::User,
            password_hash: Some(password_hash),
        })
        .await?;

    let linked = Members::new(&mut tx).link_unclaimed_by_email(&created_user.email, created_user.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(user_id = %created_user.id, linked_members = linked, "Registered new user");

    let user = UserResponse::from(created_user);
    let token = session::create_session_token(&CurrentUser::from(user.clone()), &state.config)?;

    Ok(WithSessionCookie {
        status: StatusCode::CREATED,
        body: AuthResponse {
            user,
            message: "Registration successful".to_string(),
        },
        cookie: session::session_cookie(&token, &state.config),
    })
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/sign-in/email",
    request_body = LoginRequest,
    tag = "auth",
    security(()),
    responses(
        (status = 200, description = "Session started", body = AuthResponse),
        (status = 401, description = "Invalid email or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_in(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    ensure_native_auth(&state)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(invalid_credentials)?;
    drop(conn);

    let hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = request.password;
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(invalid_credentials());
    }

    let user = UserResponse::from(user);
    let token = session::create_session_token(&CurrentUser::from(user.clone()), &state.config)?;

    Ok(WithSessionCookie {
        status: StatusCode::OK,
        body: AuthResponse {
            user,
            message: "Login successful".to_string(),
        },
        cookie: session::session_cookie(&token, &state.config),
    })
}

/// Sign out by expiring the session cookie
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tag = "auth",
    security(()),
    responses(
        (status = 200, description = "Session cookie cleared", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn sign_out(State(state): State<AppState>) -> Result<LogoutResponse, Error> {
    Ok(WithSessionCookie {
        status: StatusCode::OK,
        body: AuthSuccessResponse {
            message: "Logout successful".to_string(),
        },
        cookie: session::expired_session_cookie(&state.config),
    })
}

/// Get the account behind the current session
#[utoipa::path(
    get,
    path = "/auth/get-session",
    tag = "auth",
    responses(
        (status = 200, description = "The signed-in user", body = SessionResponse),
        (status = 401, description = "No valid session"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_session(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<SessionResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    // A token can outlive its account
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    Ok(Json(SessionResponse { user: user.into() }))
}
