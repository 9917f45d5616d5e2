//! Router tests for login, rotation, the request gates and password recovery.

mod common;

use axum::http::{Method, StatusCode};
use common::{SMS_CODE, TestApp, test_config};
use serde_json::json;
use vecino_core::models::auth::{IdentityStatus, Role};

const PHONE: &str = "+56912345678";

#[tokio::test]
async fn login_returns_pair_and_user_summary() {
    let app = TestApp::new();
    let id = app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "OldPass!234"})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 900);
    assert_eq!(body["user"]["id"], id);
    assert_eq!(body["user"]["role"], "NEIGHBOR");
    assert!(body["refreshToken"].is_string());
    assert_eq!(app.store.session_count(id).await, 1);
}

#[tokio::test]
async fn pending_account_gets_account_not_active() {
    let app = TestApp::new();
    app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::PendingApproval)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "OldPass!234"})),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "account_not_active");
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let app = TestApp::new();
    let id = app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;
    let (_, login) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "OldPass!234"})),
        )
        .await;
    let refresh = json!({"refreshToken": login["refreshToken"], "userId": id});

    let (first, rotated) = app
        .call(Method::POST, "/auth/refresh", None, Some(refresh.clone()))
        .await;
    assert_eq!(first, StatusCode::OK);
    assert_ne!(rotated["refreshToken"], login["refreshToken"]);

    let (second, body) = app
        .call(Method::POST, "/auth/refresh", None, Some(refresh))
        .await;
    assert_eq!(second, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_refresh_token");
}

#[tokio::test]
async fn concurrent_refresh_has_one_winner() {
    let app = TestApp::new();
    let id = app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;
    let (_, login) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "OldPass!234"})),
        )
        .await;
    let refresh = json!({"refreshToken": login["refreshToken"], "userId": id});

    let (a, b) = tokio::join!(
        app.call(Method::POST, "/auth/refresh", None, Some(refresh.clone())),
        app.call(Method::POST, "/auth/refresh", None, Some(refresh.clone())),
    );

    let mut statuses = [a.0, b.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);
    assert_eq!(app.store.session_count(id).await, 1);
}

#[tokio::test]
async fn protected_route_requires_valid_token() {
    let app = TestApp::new();
    app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;

    let (status, body) = app.call(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let (status, _) = app.call(Method::GET, "/auth/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.access_token(PHONE, "OldPass!234").await;
    let (status, body) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], PHONE);
    assert_eq!(body["role"], "NEIGHBOR");
}

#[tokio::test]
async fn expired_access_token_is_distinguishable() {
    let mut config = test_config();
    config.tokens.access_ttl = chrono::Duration::seconds(-60);
    let app = TestApp::with_config(config);
    app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;
    let token = app.access_token(PHONE, "OldPass!234").await;

    let (status, body) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn neighbor_is_forbidden_from_admin_routes() {
    let app = TestApp::new();
    let target = app.seed("+56900000001", "Target!234", Role::Neighbor, IdentityStatus::PendingApproval).await;
    app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;
    let token = app.access_token(PHONE, "OldPass!234").await;

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/admin/identities/{target}/status"),
            Some(&token),
            Some(json!({"status": "ACTIVE"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
}

#[tokio::test]
async fn admin_approves_pending_identity() {
    let app = TestApp::new();
    let target = app.seed("+56900000001", "Target!234", Role::Neighbor, IdentityStatus::PendingApproval).await;
    app.seed(PHONE, "Admin!2345", Role::Admin, IdentityStatus::Active).await;
    let token = app.access_token(PHONE, "Admin!2345").await;

    let (status, body) = app
        .call(
            Method::PATCH,
            &format!("/admin/identities/{target}/status"),
            Some(&token),
            Some(json!({"status": "ACTIVE"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACTIVE");

    // The approved identity can now log in.
    app.access_token("+56900000001", "Target!234").await;
}

#[tokio::test]
async fn admin_passes_routes_open_to_any_role() {
    let app = TestApp::new();
    app.seed(PHONE, "Admin!2345", Role::Admin, IdentityStatus::Active).await;
    let token = app.access_token(PHONE, "Admin!2345").await;

    let (status, body) = app.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "ADMIN");
}

#[tokio::test]
async fn forgot_password_does_not_reveal_registration() {
    let app = TestApp::new();
    app.seed("+10000000000", "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;

    let known = app
        .call(
            Method::POST,
            "/auth/password/forgot",
            None,
            Some(json!({"phone": "+10000000000"})),
        )
        .await;
    let unknown = app
        .call(
            Method::POST,
            "/auth/password/forgot",
            None,
            Some(json!({"phone": "+19999999999"})),
        )
        .await;

    assert_eq!(known, unknown);
    assert_eq!(known.0, StatusCode::ACCEPTED);
    assert_eq!(app.sms.sent_count("+10000000000"), 1);
    assert_eq!(app.sms.sent_count("+19999999999"), 0);
}

#[tokio::test]
async fn password_recovery_end_to_end() {
    let app = TestApp::new();
    let id = app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/password/forgot",
            None,
            Some(json!({"phone": PHONE})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/password/verify",
            None,
            Some(json!({"phone": PHONE, "code": "000000"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_verification_code");

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/password/verify",
            None,
            Some(json!({"phone": PHONE, "code": SMS_CODE})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["resetToken"].as_str().unwrap().to_string();
    assert_eq!(
        app.state
            .auth
            .tokens()
            .verify_reset_token(&reset_token)
            .unwrap()
            .identity_id,
        id
    );

    // An access token is not a reset token.
    let access = app.access_token(PHONE, "OldPass!234").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/password/reset",
            Some(&access),
            Some(json!({"newPassword": "NewPass!234"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_reset_token");

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/password/reset",
            Some(&reset_token),
            Some(json!({"newPassword": "NewPass!234"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    // The same reset token cannot set the password a second time.
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/password/reset",
            Some(&reset_token),
            Some(json!({"newPassword": "Hijack!2345"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_reset_token");

    app.access_token(PHONE, "NewPass!234").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "OldPass!234"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "Hijack!2345"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_the_refresh_token() {
    let app = TestApp::new();
    let id = app.seed(PHONE, "OldPass!234", Role::Neighbor, IdentityStatus::Active).await;
    let (_, login) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"phone": PHONE, "password": "OldPass!234"})),
        )
        .await;
    let body = json!({"refreshToken": login["refreshToken"], "userId": id});

    let (status, _) = app
        .call(Method::POST, "/auth/logout", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::POST, "/auth/refresh", None, Some(body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_starts_pending_verification() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"phone": PHONE, "password": "Secret!234"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "PENDING_VERIFICATION");

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register/verify",
            None,
            Some(json!({"phone": PHONE, "code": SMS_CODE})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING_APPROVAL");

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"phone": PHONE, "password": "Another!234"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}
