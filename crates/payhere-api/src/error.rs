//! API error handling
//!
//! Every failure leaving a handler is an [`AppError`]. It maps to an HTTP
//! status and an [`ApiError`] body; internal details are logged, never sent.
//!
//! Author: hephaex@gmail.com

use crate::auth::TokenError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use payhere_core::{DomainError, RepositoryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal_error() -> Self {
        Self::new("InternalError", "Internal server error")
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The reason is logged; the client only sees "Unauthorized"
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Expired token")]
    ExpiredToken,

    #[error("Password mismatch")]
    PasswordMismatch,

    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Item not found")]
    ItemNotFound,

    #[error("Item already exists")]
    ItemAlreadyExists,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::PasswordMismatch => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AppError::UserNotFound | AppError::ItemNotFound => StatusCode::NOT_FOUND,
            AppError::UserAlreadyExists | AppError::ItemAlreadyExists => StatusCode::CONFLICT,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ApiError {
        match self {
            AppError::InvalidRequest(msg) => ApiError::new("InvalidRequest", msg.clone()),
            AppError::Unauthorized(_) => ApiError::new("Unauthorized", "Unauthorized"),
            AppError::ExpiredToken => ApiError::new("ExpiredToken", "Token has expired"),
            AppError::PasswordMismatch => {
                ApiError::new("PasswordMismatch", "Password does not match")
            }
            AppError::UserNotFound => ApiError::new("UserNotFound", "User not found"),
            AppError::UserAlreadyExists => {
                ApiError::new("UserAlreadyExists", "User already exists")
            }
            AppError::ItemNotFound => ApiError::new("ItemNotFound", "Item not found"),
            AppError::ItemAlreadyExists => {
                ApiError::new("ItemAlreadyExists", "Item already exists")
            }
            AppError::Internal(_) | AppError::Database(_) => ApiError::internal_error(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidRequest(errors.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired { .. } => AppError::ExpiredToken,
            TokenError::EmptyToken => AppError::Unauthorized("empty token".to_string()),
            TokenError::Malformed(_) => AppError::Unauthorized("invalid token".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}
