//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use vecino_core::auth::AuthError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
///
/// `Unauthorized` and `Forbidden` carry a stable machine-readable code so
/// clients can tell an expired access token (refresh and retry) from any
/// other failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {1}")]
    Unauthorized(&'static str, String),

    #[error("Forbidden: {1}")]
    Forbidden(&'static str, String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(code, m) => (StatusCode::UNAUTHORIZED, *code, m.as_str()),
            AppError::Forbidden(code, m) => (StatusCode::FORBIDDEN, *code, m.as_str()),
            AppError::Internal(detail) => {
                error!(detail = %detail, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let message = e.to_string();
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized("invalid_credentials", message),
            AuthError::InvalidAccessToken => AppError::Unauthorized("invalid_token", message),
            AuthError::TokenExpired => AppError::Unauthorized("token_expired", message),
            AuthError::InvalidRefreshToken => {
                AppError::Unauthorized("invalid_refresh_token", message)
            }
            AuthError::InvalidResetToken => AppError::Unauthorized("invalid_reset_token", message),
            AuthError::InvalidVerificationCode => {
                AppError::Unauthorized("invalid_verification_code", message)
            }
            AuthError::AccountNotActive => AppError::Forbidden("account_not_active", message),
            AuthError::AccessDenied => AppError::Forbidden("access_denied", message),
            AuthError::Validation(m) => AppError::Validation(m),
            AuthError::NotFound(m) => AppError::NotFound(m),
            AuthError::StorageFailure(_) | AuthError::Db(_) | AuthError::Internal(_) => {
                AppError::Internal(message)
            }
        }
    }
}
