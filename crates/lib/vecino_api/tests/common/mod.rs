//! Shared fixtures for router tests: in-memory store, fixed-code SMS
//! provider and request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use tower::ServiceExt;
use vecino_api::{AppState, config::ApiConfig};
use vecino_core::auth::jwt::TokenConfig;
use vecino_core::auth::password::hash_password;
use vecino_core::models::auth::{IdentityStatus, NewIdentity, Role};
use vecino_core::store::{CredentialStore, MemoryCredentialStore};
use vecino_core::verification::FixedCodeProvider;

pub const SMS_CODE: &str = "482913";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
    pub sms: Arc<FixedCodeProvider>,
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: String::new(),
        tokens: TokenConfig::with_secrets("test-access", "test-refresh", "test-reset"),
        twilio: None,
        dev_verification_code: Some(SMS_CODE.into()),
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let store = Arc::new(MemoryCredentialStore::new());
        let sms = Arc::new(FixedCodeProvider::new(SMS_CODE));
        let state = AppState::new(config, store.clone(), sms.clone()).expect("app state");
        Self { state, store, sms }
    }

    pub fn router(&self) -> Router {
        vecino_api::router(self.state.clone())
    }

    /// Insert an identity directly into the store.
    pub async fn seed(&self, phone: &str, password: &str, role: Role, status: IdentityStatus) -> i64 {
        self.store
            .create(NewIdentity {
                phone: phone.into(),
                password_hash: hash_password(password).unwrap(),
                role,
                status,
            })
            .await
            .unwrap()
            .id
    }

    /// Log in and return the access token.
    pub async fn access_token(&self, phone: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(serde_json::json!({"phone": phone, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["accessToken"].as_str().unwrap().to_string()
    }

    /// Send one request through the router and decode the JSON body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}
