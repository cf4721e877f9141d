//! User account handlers
//!
//! Sign-up and sign-in are public. Sign-out reads the bearer token itself
//! and is not behind the authentication middleware, so an expired token can
//! still sign out.
//!
//! Author: hephaex@gmail.com

use crate::audit::AuditContext;
use crate::auth::{extract_bearer_token, CurrentUser};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use payhere_core::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Phone number and password
///
/// Shared by sign-up and sign-in. Not `Debug`, so the password cannot end
/// up in a log line.
#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    #[validate(length(min = 1, message = "phone number is required"))]
    #[schema(example = "01012341234")]
    pub phone_number: String,

    #[validate(length(min = 1, message = "password is required"))]
    #[schema(example = "Passw0rd!")]
    pub password: String,
}

/// Issued bearer token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            phone_number: user.phone_number,
            created_at: user.created_at,
        }
    }
}

/// Register a new account
///
/// The password must contain a digit, a lower-case letter, an upper-case
/// letter and a symbol, and must not exceed 72 bytes.
#[utoipa::path(
    post,
    path = "/v1/users/signUp",
    tag = "users",
    request_body = CredentialsRequest,
    responses(
        (status = 204, description = "Account created"),
        (status = 400, description = "Invalid phone number or password", body = crate::error::ApiError),
        (status = 409, description = "Phone number already registered", body = crate::error::ApiError),
    )
)]
pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    request.validate()?;

    state
        .users
        .sign_up(
            &request.phone_number,
            &request.password,
            &AuditContext::from_headers(&headers),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Sign in and receive a bearer token
#[utoipa::path(
    post,
    path = "/v1/users/signIn",
    tag = "users",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Token issued", body = SignInResponse),
        (status = 400, description = "Invalid input or password mismatch", body = crate::error::ApiError),
        (status = 404, description = "Unknown phone number", body = crate::error::ApiError),
    )
)]
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    request.validate()?;

    let (token, expires_at) = state
        .users
        .sign_in(
            &request.phone_number,
            &request.password,
            &AuditContext::from_headers(&headers),
        )
        .await?;

    Ok(Json(SignInResponse { token, expires_at }))
}

/// Revoke the presented bearer token
///
/// Signing out twice, or with an expired token, succeeds. The success
/// response has no body.
#[utoipa::path(
    post,
    path = "/v1/users/signOut",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Signed out"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
    )
)]
pub async fn sign_out_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("empty token".to_string()))?;

    state
        .users
        .sign_out(token, &AuditContext::from_headers(&headers))
        .await?;

    Ok(StatusCode::OK)
}

/// Current user
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Authenticated user", body = UserResponse),
        (status = 401, description = "Missing, invalid, expired or revoked token", body = crate::error::ApiError),
    )
)]
pub async fn me_handler(Extension(CurrentUser(user)): Extension<CurrentUser>) -> impl IntoResponse {
    Json(UserResponse::from(user))
}
