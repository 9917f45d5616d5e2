//! Authentication domain models.
//!
//! These are internal domain models. The HTTP layer serializes the
//! summary types directly; secrets never leave this module's structs
//! through `Serialize`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scope claim carried by password-reset tokens.
pub const RESET_PASSWORD_SCOPE: &str = "reset_password";

/// Role of a registered principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Neighbor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Neighbor => "NEIGHBOR",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "NEIGHBOR" => Ok(Role::Neighbor),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Lifecycle status of an identity. Only `Active` identities may authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityStatus {
    PendingVerification,
    PendingApproval,
    Active,
    Rejected,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStatus::PendingVerification => "PENDING_VERIFICATION",
            IdentityStatus::PendingApproval => "PENDING_APPROVAL",
            IdentityStatus::Active => "ACTIVE",
            IdentityStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_VERIFICATION" => Ok(IdentityStatus::PendingVerification),
            "PENDING_APPROVAL" => Ok(IdentityStatus::PendingApproval),
            "ACTIVE" => Ok(IdentityStatus::Active),
            "REJECTED" => Ok(IdentityStatus::Rejected),
            other => Err(format!("unknown identity status: {other}")),
        }
    }
}

/// A registered principal, without credential fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub phone: String,
    pub role: Role,
    pub status: IdentityStatus,
    pub created_at: DateTime<Utc>,
    pub password_changed_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }

    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            id: self.id,
            phone: self.phone.clone(),
            role: self.role,
            status: self.status,
        }
    }
}

/// Identity with its password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct IdentityWithSecret {
    pub identity: Identity,
    pub password_hash: String,
}

/// Fields needed to create an identity.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
    pub status: IdentityStatus,
}

/// Public view of an identity returned alongside token pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: i64,
    pub phone: String,
    pub role: Role,
    pub status: IdentityStatus,
}

/// One issued refresh token. Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub id: Uuid,
    pub identity_id: i64,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshSession {
    /// Usable for rotation only while `now < expires_at`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject: identity ID, as a decimal string.
    pub sub: String,
    pub phone: String,
    pub role: Role,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

impl AccessClaims {
    /// Numeric identity ID. Verified tokens always carry a numeric subject.
    pub fn identity_id(&self) -> i64 {
        self.sub.parse().unwrap_or_default()
    }
}

/// JWT claims embedded in refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    /// Unique token ID so two tokens minted in the same second never collide.
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

/// JWT claims embedded in password-reset tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,
    pub scope: String,
    /// Stamp of the password hash the token was issued against.
    pub pwd: String,
    pub exp: i64,
    pub iat: i64,
}

/// What a verified reset token authorizes: one password change for
/// `identity_id`, valid only while the stored hash still matches
/// `password_stamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetGrant {
    pub identity_id: i64,
    pub password_stamp: String,
}

/// Access + refresh token pair with the identity it was minted for.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub token_type: &'static str,
    pub user: IdentitySummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::Neighbor] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("admin".parse::<Role>().is_err());
        assert!("ADMINISTRATOR".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Neighbor).unwrap(), "\"NEIGHBOR\"");
    }

    #[test]
    fn status_parses_all_variants() {
        for s in ["PENDING_VERIFICATION", "PENDING_APPROVAL", "ACTIVE", "REJECTED"] {
            assert_eq!(s.parse::<IdentityStatus>().unwrap().as_str(), s);
        }
    }

    #[test]
    fn refresh_session_expires_at_boundary() {
        let now = Utc::now();
        let session = RefreshSession {
            id: Uuid::now_v7(),
            identity_id: 1,
            token_hash: "h".into(),
            issued_at: now,
            expires_at: now,
        };
        assert!(!session.is_live(now));
        assert!(session.is_live(now - chrono::Duration::seconds(1)));
    }
}
