//! Administrator-only handlers.

use axum::Json;
use axum::extract::{Path, State};
use tracing::info;
use vecino_core::models::auth::IdentitySummary;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::SetStatusRequest;

/// `PATCH /admin/identities/{id}/status`: approve, reject or suspend an identity.
pub async fn set_identity_status_handler(
    State(state): State<AppState>,
    axum::Extension(admin): axum::Extension<AuthenticatedUser>,
    Path(identity_id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> AppResult<Json<IdentitySummary>> {
    info!(admin_id = %admin.0.sub, identity_id, status = %body.status, "status change requested");
    let updated = state.auth.set_status(identity_id, body.status).await?;
    Ok(Json(updated))
}
