//! JWT token generation and verification.
//!
//! Three token classes are minted here: access, refresh and password-reset.
//! Each class is signed with its own HS256 secret, so a leaked refresh or
//! reset secret cannot forge access tokens.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use uuid::Uuid;

use super::{AuthError, AuthResult};
use super::password::password_stamp;
use crate::models::auth::{
    AccessClaims, Identity, IdentityWithSecret, RESET_PASSWORD_SCOPE, RefreshClaims, ResetClaims,
    ResetGrant,
};

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Reset token lifetime: 10 minutes.
pub const DEFAULT_RESET_TTL_SECS: i64 = 10 * 60;

/// Secrets and lifetimes for the three token classes.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
    pub reset_secret: String,
    pub reset_ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("reset_ttl", &self.reset_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenConfig {
    /// Config with default lifetimes and the given secrets.
    pub fn with_secrets(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
        reset_secret: impl Into<String>,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_secret: refresh_secret.into(),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
            reset_secret: reset_secret.into(),
            reset_ttl: Duration::seconds(DEFAULT_RESET_TTL_SECS),
        }
    }

    /// Reject empty secrets and secrets shared between token classes.
    pub fn validate(&self) -> AuthResult<()> {
        let secrets = [
            ("access", &self.access_secret),
            ("refresh", &self.refresh_secret),
            ("reset", &self.reset_secret),
        ];
        for (name, secret) in &secrets {
            if secret.is_empty() {
                return Err(AuthError::Validation(format!("{name} token secret is empty")));
            }
        }
        if self.access_secret == self.refresh_secret
            || self.access_secret == self.reset_secret
            || self.refresh_secret == self.reset_secret
        {
            return Err(AuthError::Validation(
                "token classes must use distinct secrets".into(),
            ));
        }
        Ok(())
    }
}

/// Mints and verifies signed tokens.
#[derive(Debug, Clone)]
pub struct TokenFactory {
    config: TokenConfig,
}

impl TokenFactory {
    pub fn new(config: TokenConfig) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Access token lifetime in whole seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl.num_seconds()
    }

    /// Sign `{sub, phone, role}` with the access secret.
    pub fn issue_access_token(&self, identity: &Identity) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: identity.id.to_string(),
            phone: identity.phone.clone(),
            role: identity.role,
            exp: (now + self.config.access_ttl).timestamp(),
            iat: now.timestamp(),
        };
        sign(&claims, &self.config.access_secret)
    }

    /// Sign `{sub}` with the refresh secret. Returns the token and its expiry.
    pub fn issue_refresh_token(
        &self,
        identity: &Identity,
    ) -> AuthResult<(String, chrono::DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.config.refresh_ttl;
        let claims = RefreshClaims {
            sub: identity.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        Ok((sign(&claims, &self.config.refresh_secret)?, expires_at))
    }

    /// Issue an access and a refresh token for the same identity.
    pub fn issue_token_pair(
        &self,
        identity: &Identity,
    ) -> AuthResult<(String, String, chrono::DateTime<Utc>)> {
        let access = self.issue_access_token(identity)?;
        let (refresh, refresh_expires_at) = self.issue_refresh_token(identity)?;
        Ok((access, refresh, refresh_expires_at))
    }

    /// Sign `{sub, scope="reset_password", pwd}` with the reset secret.
    ///
    /// `pwd` stamps the current password hash, so the token stops working
    /// as soon as the password changes.
    pub fn issue_reset_token(&self, identity: &IdentityWithSecret) -> AuthResult<String> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: identity.identity.id.to_string(),
            scope: RESET_PASSWORD_SCOPE.to_string(),
            pwd: password_stamp(&identity.password_hash),
            exp: (now + self.config.reset_ttl).timestamp(),
            iat: now.timestamp(),
        };
        sign(&claims, &self.config.reset_secret)
    }

    /// Verify signature and expiry of an access token.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        let claims: AccessClaims = verify(token, &self.config.access_secret).map_err(|kind| {
            match kind {
                TokenFailure::Expired => AuthError::TokenExpired,
                TokenFailure::Invalid => AuthError::InvalidAccessToken,
            }
        })?;
        if claims.sub.parse::<i64>().is_err() {
            return Err(AuthError::InvalidAccessToken);
        }
        Ok(claims)
    }

    /// Verify a refresh token and return the identity ID it was minted for.
    pub fn verify_refresh_token(&self, token: &str) -> AuthResult<i64> {
        let claims: RefreshClaims = verify(token, &self.config.refresh_secret)
            .map_err(|_| AuthError::InvalidRefreshToken)?;
        claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidRefreshToken)
    }

    /// Verify a reset token, including its scope, and return the grant it
    /// carries.
    pub fn verify_reset_token(&self, token: &str) -> AuthResult<ResetGrant> {
        let claims: ResetClaims = verify(token, &self.config.reset_secret)
            .map_err(|_| AuthError::InvalidResetToken)?;
        if claims.scope != RESET_PASSWORD_SCOPE || claims.pwd.is_empty() {
            return Err(AuthError::InvalidResetToken);
        }
        let identity_id = claims.sub.parse().map_err(|_| AuthError::InvalidResetToken)?;
        Ok(ResetGrant {
            identity_id,
            password_stamp: claims.pwd,
        })
    }
}

enum TokenFailure {
    Expired,
    Invalid,
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> AuthResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, TokenFailure> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;
    decode::<T>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenFailure::Expired,
            _ => TokenFailure::Invalid,
        })
}

/// Resolve a signing secret: env var `env_key` → persisted file `file_name`
/// under the user data dir → freshly generated and persisted.
pub fn resolve_secret(env_key: &str, file_name: &str) -> String {
    if let Ok(secret) = std::env::var(env_key)
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = secret_path(file_name);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), env_key, "generated new signing secret");
    secret
}

fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vecino")
        .join(file_name)
}
