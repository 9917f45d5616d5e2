//! Authentication service: the operations exposed to the transport layer.
//!
//! Wires the credential store, the verification provider and the token
//! factory into login, registration, rotation, logout, status transitions
//! and password recovery.

use std::sync::Arc;

use tracing::{info, warn};

use super::jwt::TokenFactory;
use super::password::{hash_password, validate_password, verify_password};
use super::recovery::PasswordRecovery;
use super::refresh::RefreshRotationService;
use super::{AuthError, AuthResult};
use crate::models::auth::{
    IdentityStatus, IdentitySummary, NewIdentity, ResetGrant, Role, SessionTokens,
};
use crate::store::CredentialStore;
use crate::verification::VerificationProvider;

/// Validate an E.164 phone number: `+` followed by 8 to 15 digits.
pub fn validate_phone(phone: &str) -> AuthResult<()> {
    let digits = phone
        .strip_prefix('+')
        .ok_or_else(|| AuthError::Validation("Phone must be in E.164 format".into()))?;
    if !(8..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation("Phone must be in E.164 format".into()));
    }
    Ok(())
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn VerificationProvider>,
    tokens: TokenFactory,
    sessions: RefreshRotationService,
    recovery: PasswordRecovery,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn VerificationProvider>,
        tokens: TokenFactory,
    ) -> Self {
        Self {
            sessions: RefreshRotationService::new(store.clone(), tokens.clone()),
            recovery: PasswordRecovery::new(store.clone(), verifier.clone(), tokens.clone()),
            store,
            verifier,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenFactory {
        &self.tokens
    }

    /// Create a `NEIGHBOR` identity pending phone verification and send it a
    /// verification code.
    pub async fn register(&self, phone: &str, password: &str) -> AuthResult<IdentitySummary> {
        validate_phone(phone)?;
        validate_password(password)?;

        let identity = self
            .store
            .create(NewIdentity {
                phone: phone.to_string(),
                password_hash: hash_password(password)?,
                role: Role::Neighbor,
                status: IdentityStatus::PendingVerification,
            })
            .await?;

        if let Err(e) = self.verifier.send_code(phone).await {
            warn!(user_id = identity.id, error = %e, "registration code delivery failed");
        }
        info!(user_id = identity.id, "identity registered");
        Ok(identity.summary())
    }

    /// Confirm the phone of a freshly registered identity, moving it to
    /// `PENDING_APPROVAL`.
    pub async fn verify_phone(&self, phone: &str, code: &str) -> AuthResult<IdentitySummary> {
        let passed = self
            .verifier
            .check_code(phone, code)
            .await
            .map_err(|e| AuthError::Internal(format!("verification provider: {e}")))?;
        if !passed {
            return Err(AuthError::InvalidVerificationCode);
        }
        let mut identity = self
            .store
            .find_by_phone_with_secret(phone)
            .await?
            .ok_or(AuthError::InvalidVerificationCode)?;
        if identity.identity.status != IdentityStatus::PendingVerification {
            return Err(AuthError::Validation("Phone already verified".into()));
        }
        identity.identity.status = IdentityStatus::PendingApproval;
        self.store.save(&identity).await?;
        info!(user_id = identity.identity.id, "phone verified, awaiting approval");
        Ok(identity.identity.summary())
    }

    /// Authenticate with phone + password.
    ///
    /// Unknown phone and wrong password both yield `InvalidCredentials`.
    /// The status check runs only after the password matched.
    pub async fn login(&self, phone: &str, password: &str) -> AuthResult<SessionTokens> {
        let Some(found) = self.store.find_by_phone_with_secret(phone).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &found.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !found.identity.is_active() {
            info!(user_id = found.identity.id, status = %found.identity.status, "login for inactive identity");
            return Err(AuthError::AccountNotActive);
        }
        let tokens = self.sessions.issue(&found.identity).await?;
        info!(user_id = found.identity.id, "login succeeded");
        Ok(tokens)
    }

    /// Rotate a refresh token.
    pub async fn refresh(&self, refresh_token: &str, identity_id: i64) -> AuthResult<SessionTokens> {
        self.sessions.rotate(refresh_token, identity_id).await
    }

    /// Invalidate one refresh session. Unknown tokens are ignored.
    pub async fn logout(&self, refresh_token: &str, identity_id: i64) -> AuthResult<()> {
        let removed = self.sessions.revoke(refresh_token, identity_id).await?;
        info!(user_id = identity_id, removed, "logout");
        Ok(())
    }

    /// Invalidate every refresh session of an identity.
    pub async fn logout_all(&self, identity_id: i64) -> AuthResult<u64> {
        self.sessions.revoke_all(identity_id).await
    }

    /// Administrative status transition. Leaving `ACTIVE` revokes all
    /// sessions; already-issued access tokens run out on their own.
    pub async fn set_status(
        &self,
        identity_id: i64,
        status: IdentityStatus,
    ) -> AuthResult<IdentitySummary> {
        let mut identity = self
            .store
            .find_by_id_with_secret(identity_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("identity {identity_id}")))?;
        let previous = identity.identity.status;
        identity.identity.status = status;
        self.store.save(&identity).await?;

        if previous == IdentityStatus::Active && status != IdentityStatus::Active {
            self.sessions.revoke_all(identity_id).await?;
        }
        info!(user_id = identity_id, from = %previous, to = %status, "identity status changed");
        Ok(identity.identity.summary())
    }

    /// Always succeeds from the caller's point of view.
    pub async fn request_password_reset(&self, phone: &str) {
        self.recovery.request_reset(phone).await
    }

    pub async fn confirm_password_reset_code(&self, phone: &str, code: &str) -> AuthResult<String> {
        self.recovery.confirm_code(phone, code).await
    }

    /// `grant` must come from a verified reset token.
    pub async fn set_new_password(
        &self,
        grant: &ResetGrant,
        new_password: &str,
    ) -> AuthResult<&'static str> {
        self.recovery.apply_new_password(grant, new_password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::test_config;
    use crate::store::MemoryCredentialStore;
    use crate::verification::FixedCodeProvider;

    const PHONE: &str = "+56912345678";

    async fn service_with(status: IdentityStatus) -> (Arc<MemoryCredentialStore>, AuthService, i64) {
        let store = Arc::new(MemoryCredentialStore::new());
        let identity = store
            .create(NewIdentity {
                phone: PHONE.into(),
                password_hash: hash_password("OldPass!234").unwrap(),
                role: Role::Neighbor,
                status,
            })
            .await
            .unwrap();
        let service = AuthService::new(
            store.clone(),
            Arc::new(FixedCodeProvider::new("482913")),
            TokenFactory::new(test_config()).unwrap(),
        );
        (store, service, identity.id)
    }

    #[tokio::test]
    async fn login_issues_verifiable_pair_with_stored_session() {
        let (store, service, id) = service_with(IdentityStatus::Active).await;
        let tokens = service.login(PHONE, "OldPass!234").await.unwrap();
        let claims = service.tokens().verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.identity_id(), id);
        assert_eq!(tokens.user.id, id);
        assert_eq!(store.session_count(id).await, 1);
    }

    #[tokio::test]
    async fn inactive_identities_cannot_log_in() {
        for status in [
            IdentityStatus::PendingVerification,
            IdentityStatus::PendingApproval,
            IdentityStatus::Rejected,
        ] {
            let (_, service, _) = service_with(status).await;
            let err = service.login(PHONE, "OldPass!234").await.unwrap_err();
            assert!(matches!(err, AuthError::AccountNotActive), "{status}");
        }
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_phone_look_the_same() {
        let (_, service, _) = service_with(IdentityStatus::Active).await;
        let wrong = service.login(PHONE, "nope-nope").await.unwrap_err();
        let unknown = service.login("+19999999999", "OldPass!234").await.unwrap_err();
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert!(matches!(unknown, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn deactivation_revokes_sessions() {
        let (store, service, id) = service_with(IdentityStatus::Active).await;
        let tokens = service.login(PHONE, "OldPass!234").await.unwrap();
        service.set_status(id, IdentityStatus::Rejected).await.unwrap();
        assert_eq!(store.session_count(id).await, 0);
        let err = service.refresh(&tokens.refresh_token, id).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn registration_walks_through_verification_and_approval() {
        let store = Arc::new(MemoryCredentialStore::new());
        let service = AuthService::new(
            store.clone(),
            Arc::new(FixedCodeProvider::new("111222")),
            TokenFactory::new(test_config()).unwrap(),
        );
        let created = service.register("+56987654321", "Secret!234").await.unwrap();
        assert_eq!(created.status, IdentityStatus::PendingVerification);
        assert_eq!(created.role, Role::Neighbor);

        let verified = service.verify_phone("+56987654321", "111222").await.unwrap();
        assert_eq!(verified.status, IdentityStatus::PendingApproval);
        assert!(matches!(
            service.login("+56987654321", "Secret!234").await,
            Err(AuthError::AccountNotActive)
        ));

        service.set_status(created.id, IdentityStatus::Active).await.unwrap();
        assert!(service.login("+56987654321", "Secret!234").await.is_ok());
    }

    #[tokio::test]
    async fn end_to_end_password_recovery() {
        let (store, service, id) = service_with(IdentityStatus::Active).await;
        service.login(PHONE, "OldPass!234").await.unwrap();

        service.request_password_reset(PHONE).await;
        let reset = service
            .confirm_password_reset_code(PHONE, "482913")
            .await
            .unwrap();
        let grant = service.tokens().verify_reset_token(&reset).unwrap();
        assert_eq!(grant.identity_id, id);

        let message = service.set_new_password(&grant, "NewPass!234").await.unwrap();
        assert!(!message.is_empty());
        assert_eq!(store.session_count(id).await, 0);

        assert!(service.login(PHONE, "NewPass!234").await.is_ok());
        assert!(matches!(
            service.login(PHONE, "OldPass!234").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn phone_format_is_checked() {
        assert!(validate_phone("+56912345678").is_ok());
        assert!(validate_phone("56912345678").is_err());
        assert!(validate_phone("+5691234abc").is_err());
        assert!(validate_phone("+123").is_err());
    }
}
