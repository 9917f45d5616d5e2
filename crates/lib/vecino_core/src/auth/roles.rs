//! Per-operation access policy and the role authorization check.

use std::collections::HashSet;

use tracing::{info, warn};

use super::{AuthError, AuthResult};
use crate::models::auth::{AccessClaims, Role};

/// Access requirements of one operation, resolved at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoutePolicy {
    /// Public operations skip authentication entirely.
    pub public: bool,
    /// Roles allowed to call the operation. Empty means any authenticated
    /// identity.
    pub required_roles: HashSet<Role>,
}

impl RoutePolicy {
    pub fn public() -> Self {
        Self {
            public: true,
            required_roles: HashSet::new(),
        }
    }

    /// Any authenticated identity.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            public: false,
            required_roles: roles.into_iter().collect(),
        }
    }
}

/// Check `claims` against `required`.
///
/// Admins pass every check. Other roles must be strictly equal to a member
/// of `required`.
pub fn authorize(claims: Option<&AccessClaims>, required: &HashSet<Role>) -> AuthResult<()> {
    if required.is_empty() {
        return Ok(());
    }
    let Some(claims) = claims else {
        warn!("role check without an authenticated identity");
        return Err(AuthError::AccessDenied);
    };
    if claims.role.is_admin() {
        return Ok(());
    }
    if required.iter().any(|role| *role == claims.role) {
        return Ok(());
    }
    info!(
        user_id = %claims.sub,
        role = %claims.role,
        required = ?required,
        "access denied by role gate"
    );
    Err(AuthError::AccessDenied)
}
