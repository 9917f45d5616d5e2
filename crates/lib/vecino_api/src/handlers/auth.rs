//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use vecino_core::models::auth::{IdentitySummary, SessionTokens};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, LogoutRequest, LogoutResponse, MeResponse, PhoneCodeRequest, RefreshRequest,
    RegisterRequest,
};

/// `POST /auth/register`: create a neighbor account pending phone verification.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<IdentitySummary>)> {
    let created = state.auth.register(&body.phone, &body.password).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /auth/register/verify`: confirm the phone of a new account.
pub async fn verify_phone_handler(
    State(state): State<AppState>,
    Json(body): Json<PhoneCodeRequest>,
) -> AppResult<Json<IdentitySummary>> {
    let verified = state.auth.verify_phone(&body.phone, &body.code).await?;
    Ok(Json(verified))
}

/// `POST /auth/login`: authenticate with phone + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<SessionTokens>> {
    let tokens = state.auth.login(&body.phone, &body.password).await?;
    Ok(Json(tokens))
}

/// `POST /auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<SessionTokens>> {
    let tokens = state.auth.refresh(&body.refresh_token, body.user_id).await?;
    Ok(Json(tokens))
}

/// `POST /auth/logout`: invalidate one refresh session.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<LogoutResponse>> {
    state.auth.logout(&body.refresh_token, body.user_id).await?;
    Ok(Json(LogoutResponse {
        success: true,
        revoked: None,
    }))
}

/// `POST /auth/logout-all`: invalidate every session of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> AppResult<Json<LogoutResponse>> {
    let revoked = state.auth.logout_all(user.0.identity_id()).await?;
    Ok(Json(LogoutResponse {
        success: true,
        revoked: Some(revoked),
    }))
}

/// `GET /auth/me`: the identity bound to the access token.
pub async fn me_handler(
    axum::Extension(user): axum::Extension<AuthenticatedUser>,
) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.0.identity_id(),
        phone: user.0.phone.clone(),
        role: user.0.role,
    })
}
