//! Password recovery: phone code → reset token → new password.
//!
//! The flow keeps no state of its own between steps. Code delivery and
//! checking belong to the verification provider; the reset token carries
//! the identity from step 2 to step 3.
//!
//! Step 1 never reports anything to its caller, so the response cannot be
//! used to find out which phones are registered.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use super::jwt::TokenFactory;
use super::password::{hash_password, password_stamp, validate_password};
use super::{AuthError, AuthResult};
use crate::models::auth::ResetGrant;
use crate::store::CredentialStore;
use crate::verification::VerificationProvider;

/// Message returned once a new password has been stored.
pub const PASSWORD_UPDATED_MESSAGE: &str = "Password updated successfully";

pub struct PasswordRecovery {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn VerificationProvider>,
    tokens: TokenFactory,
}

impl PasswordRecovery {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn VerificationProvider>,
        tokens: TokenFactory,
    ) -> Self {
        Self {
            store,
            verifier,
            tokens,
        }
    }

    /// Send a reset code if `phone` belongs to an identity. Always returns
    /// normally; every failure is logged only.
    pub async fn request_reset(&self, phone: &str) {
        let identity = match self.store.find_by_phone(phone).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                info!("password reset requested for unknown phone");
                return;
            }
            Err(e) => {
                error!(error = %e, "password reset lookup failed");
                return;
            }
        };

        match self.verifier.send_code(phone).await {
            Ok(()) => info!(user_id = identity.id, "password reset code sent"),
            Err(e) => error!(user_id = identity.id, error = %e, "password reset code delivery failed"),
        }
    }

    /// Check the code and mint a reset token for the identity owning `phone`.
    pub async fn confirm_code(&self, phone: &str, code: &str) -> AuthResult<String> {
        let passed = self.verifier.check_code(phone, code).await.map_err(|e| {
            error!(error = %e, "verification check failed");
            AuthError::Internal(format!("verification provider: {e}"))
        })?;
        if !passed {
            return Err(AuthError::InvalidVerificationCode);
        }

        let Some(identity) = self.store.find_by_phone_with_secret(phone).await? else {
            warn!("verification passed for a phone with no identity");
            return Err(AuthError::InvalidVerificationCode);
        };

        info!(user_id = identity.identity.id, "reset token issued");
        self.tokens.issue_reset_token(&identity)
    }

    /// Store a new password for the identity named by `grant`, then drop its
    /// refresh sessions.
    ///
    /// `grant` must come from a verified reset token. It authorizes one
    /// change: once the stored hash moves on, the same grant is rejected
    /// with `InvalidResetToken`, also when two requests race with it.
    pub async fn apply_new_password(
        &self,
        grant: &ResetGrant,
        new_password: &str,
    ) -> AuthResult<&'static str> {
        let identity_id = grant.identity_id;
        let identity = self
            .store
            .find_by_id_with_secret(identity_id)
            .await
            .inspect_err(|e| error!(user_id = identity_id, error = %e, "identity lookup failed"))?
            .ok_or_else(|| AuthError::NotFound(format!("identity {identity_id}")))?;

        if password_stamp(&identity.password_hash) != grant.password_stamp {
            warn!(user_id = identity_id, "reset token presented after the password changed");
            return Err(AuthError::InvalidResetToken);
        }
        validate_password(new_password)?;

        let new_hash = hash_password(new_password)?;
        let replaced = self
            .store
            .replace_password(identity_id, &identity.password_hash, &new_hash, Utc::now())
            .await
            .inspect_err(|e| error!(user_id = identity_id, error = %e, "password update failed"))?;
        if !replaced {
            warn!(user_id = identity_id, "concurrent password change won the race");
            return Err(AuthError::InvalidResetToken);
        }

        let revoked = self.store.delete_refresh_sessions_for(identity_id).await?;
        info!(user_id = identity_id, revoked, "password updated");
        Ok(PASSWORD_UPDATED_MESSAGE)
    }
}
