//! Route paths and their access policies.

use std::collections::HashMap;

use axum::extract::MatchedPath;
use axum::http::Method;
use vecino_core::auth::roles::RoutePolicy;
use vecino_core::models::auth::Role;

pub const POST_AUTH_REGISTER: &str = "/auth/register";
pub const POST_AUTH_REGISTER_VERIFY: &str = "/auth/register/verify";
pub const POST_AUTH_LOGIN: &str = "/auth/login";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/auth/logout-all";
pub const GET_AUTH_ME: &str = "/auth/me";
pub const POST_AUTH_PASSWORD_FORGOT: &str = "/auth/password/forgot";
pub const POST_AUTH_PASSWORD_VERIFY: &str = "/auth/password/verify";
pub const POST_AUTH_PASSWORD_RESET: &str = "/auth/password/reset";
pub const PATCH_ADMIN_IDENTITY_STATUS: &str = "/admin/identities/{id}/status";
pub const GET_WS: &str = "/ws";

/// Access policies keyed by method and matched route path.
///
/// Routes without an entry require an authenticated identity.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<(Method, String), RoutePolicy>,
    fallback: RoutePolicy,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
            fallback: RoutePolicy::authenticated(),
        }
    }

    pub fn with(mut self, method: Method, path: &str, policy: RoutePolicy) -> Self {
        self.policies.insert((method, path.to_string()), policy);
        self
    }

    /// Policy for a request, resolved at dispatch time.
    pub fn resolve(&self, method: &Method, path: Option<&MatchedPath>) -> &RoutePolicy {
        path.and_then(|p| self.policies.get(&(method.clone(), p.as_str().to_string())))
            .unwrap_or(&self.fallback)
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Policies of every route mounted by [`crate::router`].
pub fn policies() -> PolicyTable {
    PolicyTable::new()
        .with(Method::POST, POST_AUTH_REGISTER, RoutePolicy::public())
        .with(Method::POST, POST_AUTH_REGISTER_VERIFY, RoutePolicy::public())
        .with(Method::POST, POST_AUTH_LOGIN, RoutePolicy::public())
        .with(Method::POST, POST_AUTH_REFRESH, RoutePolicy::public())
        .with(Method::POST, POST_AUTH_LOGOUT, RoutePolicy::public())
        .with(Method::POST, POST_AUTH_PASSWORD_FORGOT, RoutePolicy::public())
        .with(Method::POST, POST_AUTH_PASSWORD_VERIFY, RoutePolicy::public())
        // Guarded by the reset-token extractor instead of the access gate.
        .with(Method::POST, POST_AUTH_PASSWORD_RESET, RoutePolicy::public())
        // The socket handler authenticates its own handshake.
        .with(Method::GET, GET_WS, RoutePolicy::public())
        .with(Method::GET, GET_AUTH_ME, RoutePolicy::authenticated())
        .with(Method::POST, POST_AUTH_LOGOUT_ALL, RoutePolicy::authenticated())
        .with(
            Method::PATCH,
            PATCH_ADMIN_IDENTITY_STATUS,
            RoutePolicy::roles([Role::Admin]),
        )
}
