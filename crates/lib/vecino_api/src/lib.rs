//! # vecino_api
//!
//! HTTP and realtime API library for Vecino.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vecino_core::auth::AuthResult;
use vecino_core::auth::jwt::TokenFactory;
use vecino_core::auth::service::AuthService;
use vecino_core::realtime::ChannelHub;
use vecino_core::store::CredentialStore;
use vecino_core::verification::VerificationProvider;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, password, realtime};
use crate::routes::PolicyTable;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Login, rotation, recovery and status operations.
    pub auth: Arc<AuthService>,
    /// Realtime channel registry.
    pub hub: Arc<ChannelHub>,
    /// Per-route access policies.
    pub policies: Arc<PolicyTable>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the auth core from its collaborators. Fails when the token
    /// configuration is rejected.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn VerificationProvider>,
    ) -> AuthResult<Self> {
        let tokens = TokenFactory::new(config.tokens.clone())?;
        Ok(Self {
            auth: Arc::new(AuthService::new(store, verifier, tokens.clone())),
            hub: Arc::new(ChannelHub::new(tokens)),
            policies: Arc::new(routes::policies()),
            config,
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_REGISTER_VERIFY, post(auth::verify_phone_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(
            routes::POST_AUTH_PASSWORD_FORGOT,
            post(password::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_PASSWORD_VERIFY,
            post(password::verify_reset_code_handler),
        )
        .route(
            routes::POST_AUTH_PASSWORD_RESET,
            post(password::reset_password_handler),
        )
        .route(
            routes::PATCH_ADMIN_IDENTITY_STATUS,
            patch(admin::set_identity_status_handler),
        )
        .route(routes::GET_WS, get(realtime::ws_handler))
        // Layers wrap outward: `authenticate` runs first, then `authorize`.
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authorize,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
