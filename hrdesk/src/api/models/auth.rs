//! API request/response models for session authentication.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::UserResponse;
use crate::config::PasswordConfig;
use crate::validation::FieldErrors;

/// Request to register a new account with email and password
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    /// Email address (must be unique, compared case-insensitively)
    #[serde(deserialize_with = "crate::validation::deserialize_email")]
    pub email: String,
    /// Password (will be hashed)
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self, password: &PasswordConfig) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();
        errors.check_required("name", &self.name, 255, "Name is required", "Name too long");
        if !crate::validation::is_valid_email(&self.email) {
            errors.add("email", "Invalid email format");
        }
        let len = self.password.chars().count();
        if len < password.min_length {
            errors.add("password", format!("Password must be at least {} characters", password.min_length));
        } else if len > password.max_length {
            errors.add("password", format!("Password must be no more than {} characters", password.max_length));
        }
        errors.into_result()
    }
}

/// Request to sign in
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(deserialize_with = "crate::validation::deserialize_email")]
    pub email: String,
    pub password: String,
}

/// Response after successful sign-in or registration
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

/// The session of the current caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: UserResponse,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// An auth response delivered together with a `Set-Cookie` header
pub struct WithSessionCookie<T> {
    pub status: StatusCode,
    pub body: T,
    pub cookie: String,
}

impl<T: Serialize> IntoResponse for WithSessionCookie<T> {
    fn into_response(self) -> Response {
        (self.status, [(header::SET_COOKIE, self.cookie)], Json(self.body)).into_response()
    }
}

pub type RegisterResponse = WithSessionCookie<AuthResponse>;
pub type LoginResponse = WithSessionCookie<AuthResponse>;
pub type LogoutResponse = WithSessionCookie<AuthSuccessResponse>;
