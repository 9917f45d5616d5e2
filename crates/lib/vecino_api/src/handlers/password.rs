//! Password recovery handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::ResetPrincipal;
use crate::models::{
    ForgotPasswordRequest, MessageResponse, PhoneCodeRequest, ResetPasswordRequest,
    ResetTokenResponse,
};

/// Returned for every forgot-password request, whatever the outcome.
const FORGOT_PASSWORD_MESSAGE: &str =
    "If the phone is registered, a verification code has been sent";

/// `POST /auth/password/forgot`: request a reset code. Always `202`.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    state.auth.request_password_reset(&body.phone).await;
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: FORGOT_PASSWORD_MESSAGE.to_string(),
        }),
    )
}

/// `POST /auth/password/verify`: trade a valid code for a reset token.
pub async fn verify_reset_code_handler(
    State(state): State<AppState>,
    Json(body): Json<PhoneCodeRequest>,
) -> AppResult<Json<ResetTokenResponse>> {
    let reset_token = state
        .auth
        .confirm_password_reset_code(&body.phone, &body.code)
        .await?;
    Ok(Json(ResetTokenResponse { reset_token }))
}

/// `POST /auth/password/reset`: set a new password. Requires
/// `Authorization: Bearer <reset token>`.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    ResetPrincipal(grant): ResetPrincipal,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let message = state
        .auth
        .set_new_password(&grant, &body.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}
