//! Request gates: access-token authentication, role authorization and the
//! reset-token extractor.

use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use vecino_core::auth::AuthError;
use vecino_core::auth::roles;
use vecino_core::models::auth::{AccessClaims, ResetGrant};

use crate::AppState;
use crate::error::AppError;

/// Key used to store verified `AccessClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AccessClaims);

/// Grant taken from a verified password-reset token.
#[derive(Debug, Clone)]
pub struct ResetPrincipal(pub ResetGrant);

/// Extract the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware: skips public routes, otherwise verifies the bearer
/// access token and injects `AuthenticatedUser` into request extensions.
///
/// Never touches the credential store.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let public = state
        .policies
        .resolve(request.method(), request.extensions().get::<MatchedPath>())
        .public;
    if public {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers()).ok_or(AuthError::InvalidAccessToken)?;
    let claims = state.auth.tokens().verify_access_token(token)?;

    request.extensions_mut().insert(AuthenticatedUser(claims));
    Ok(next.run(request).await)
}

/// Axum middleware: checks the authenticated identity against the route's
/// required roles. Must run inside [`authenticate`].
pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let policy = state
        .policies
        .resolve(request.method(), request.extensions().get::<MatchedPath>());
    if !policy.public {
        let user = request
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|u| &u.0);
        roles::authorize(user, &policy.required_roles)?;
    }
    Ok(next.run(request).await)
}

impl FromRequestParts<AppState> for ResetPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::InvalidResetToken)?;
        let grant = state.auth.tokens().verify_reset_token(token)?;
        Ok(ResetPrincipal(grant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
