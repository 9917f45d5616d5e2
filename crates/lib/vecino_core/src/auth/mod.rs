//! Authentication and authorization logic.
//!
//! Provides password hashing, token minting, refresh rotation, role gating
//! and password recovery. Shared by the HTTP and realtime surfaces of
//! `vecino_api`.

pub mod jwt;
pub mod password;
pub mod recovery;
pub mod refresh;
pub mod roles;
pub mod service;

use thiserror::Error;

/// Result alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and authorization errors.
///
/// Token failures deliberately collapse to `InvalidAccessToken` or
/// `TokenExpired`: callers never learn whether a token was forged or malformed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not active")]
    AccountNotActive,

    #[error("Invalid access token")]
    InvalidAccessToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Access denied")]
    AccessDenied,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
