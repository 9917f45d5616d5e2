//! Refresh-session issuance and single-use rotation.
//!
//! A session moves `Issued -> Rotated | Expired | LoggedOut`. Rotation
//! deletes the presented session before minting its successor; the store's
//! conditional delete is the linearization point, so of two concurrent
//! rotations of the same token exactly one wins.

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::jwt::TokenFactory;
use super::{AuthError, AuthResult};
use crate::models::auth::{Identity, SessionTokens};
use crate::store::CredentialStore;

/// SHA-256 hash a refresh token for storage.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RefreshRotationService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenFactory,
}

impl RefreshRotationService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenFactory) -> Self {
        Self { store, tokens }
    }

    /// Mint a token pair for `identity` and persist its refresh session.
    pub async fn issue(&self, identity: &Identity) -> AuthResult<SessionTokens> {
        let (access_token, refresh_token, expires_at) = self.tokens.issue_token_pair(identity)?;
        self.store
            .create_refresh_session(identity.id, &hash_refresh_token(&refresh_token), expires_at)
            .await?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            expires_in: self.tokens.access_ttl_secs(),
            token_type: "Bearer",
            user: identity.summary(),
        })
    }

    /// Exchange a refresh token for a new pair. The presented token is
    /// consumed whether or not a successor can be minted.
    pub async fn rotate(&self, presented: &str, claimed_identity_id: i64) -> AuthResult<SessionTokens> {
        match self.tokens.verify_refresh_token(presented) {
            Ok(sub) if sub == claimed_identity_id => {}
            _ => {
                debug!(identity_id = claimed_identity_id, "refresh token failed verification");
                return Err(AuthError::InvalidRefreshToken);
            }
        }

        let token_hash = hash_refresh_token(presented);
        let session = self
            .store
            .find_refresh_session(&token_hash, claimed_identity_id)
            .await?
            .ok_or(AuthError::InvalidRefreshToken)?;

        // Losers of a concurrent rotation and expired sessions both end here.
        let removed = self.store.delete_refresh_session(session.id).await?;
        if !removed || !session.is_live(Utc::now()) {
            debug!(
                identity_id = claimed_identity_id,
                removed, "refresh session consumed or expired"
            );
            return Err(AuthError::InvalidRefreshToken);
        }

        let identity = match self.store.find_by_id(claimed_identity_id).await? {
            Some(identity) if identity.is_active() => identity,
            Some(identity) => {
                warn!(identity_id = identity.id, status = %identity.status, "refresh for inactive identity");
                return Err(AuthError::InvalidRefreshToken);
            }
            None => return Err(AuthError::InvalidRefreshToken),
        };

        self.issue(&identity).await
    }

    /// Delete the session of one refresh token. Returns whether it existed.
    pub async fn revoke(&self, presented: &str, identity_id: i64) -> AuthResult<bool> {
        let token_hash = hash_refresh_token(presented);
        match self.store.find_refresh_session(&token_hash, identity_id).await? {
            Some(session) => self.store.delete_refresh_session(session.id).await,
            None => Ok(false),
        }
    }

    /// Delete every session of an identity.
    pub async fn revoke_all(&self, identity_id: i64) -> AuthResult<u64> {
        let removed = self.store.delete_refresh_sessions_for(identity_id).await?;
        debug!(identity_id, removed, "revoked refresh sessions");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::test_config;
    use crate::models::auth::{IdentityStatus, NewIdentity, Role};
    use crate::store::MemoryCredentialStore;

    async fn setup() -> (Arc<MemoryCredentialStore>, RefreshRotationService, Identity) {
        let store = Arc::new(MemoryCredentialStore::new());
        let identity = store
            .create(NewIdentity {
                phone: "+56911112222".into(),
                password_hash: "unused".into(),
                role: Role::Neighbor,
                status: IdentityStatus::Active,
            })
            .await
            .unwrap();
        let service = RefreshRotationService::new(
            store.clone(),
            TokenFactory::new(test_config()).unwrap(),
        );
        (store, service, identity)
    }

    #[tokio::test]
    async fn rotated_token_cannot_be_reused() {
        let (store, service, identity) = setup().await;
        let first = service.issue(&identity).await.unwrap();

        let second = service
            .rotate(&first.refresh_token, identity.id)
            .await
            .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(store.session_count(identity.id).await, 1);

        let err = service
            .rotate(&first.refresh_token, identity.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn concurrent_rotation_has_exactly_one_winner() {
        let (store, service, identity) = setup().await;
        let service = Arc::new(service);
        let issued = service.issue(&identity).await.unwrap();
        let id = identity.id;

        let a = {
            let service = service.clone();
            let token = issued.refresh_token.clone();
            tokio::spawn(async move { service.rotate(&token, id).await })
        };
        let b = {
            let service = service.clone();
            let token = issued.refresh_token.clone();
            tokio::spawn(async move { service.rotate(&token, id).await })
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AuthError::InvalidRefreshToken))));
        assert_eq!(store.session_count(identity.id).await, 1);
    }

    #[tokio::test]
    async fn token_presented_for_another_identity_is_rejected() {
        let (_store, service, identity) = setup().await;
        let issued = service.issue(&identity).await.unwrap();
        let err = service
            .rotate(&issued.refresh_token, identity.id + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn expired_session_is_rejected_and_removed() {
        let store = Arc::new(MemoryCredentialStore::new());
        let identity = store
            .create(NewIdentity {
                phone: "+56933334444".into(),
                password_hash: "unused".into(),
                role: Role::Neighbor,
                status: IdentityStatus::Active,
            })
            .await
            .unwrap();
        let tokens = TokenFactory::new(test_config()).unwrap();
        let (_, refresh, _) = tokens.issue_token_pair(&identity).unwrap();
        // Store-side expiry is authoritative even when the JWT is still valid.
        store
            .create_refresh_session(
                identity.id,
                &hash_refresh_token(&refresh),
                Utc::now() - chrono::Duration::seconds(1),
            )
            .await
            .unwrap();
        let service = RefreshRotationService::new(store.clone(), tokens);

        let err = service.rotate(&refresh, identity.id).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRefreshToken));
        assert_eq!(store.session_count(identity.id).await, 0);
    }

    #[tokio::test]
    async fn revoke_all_clears_every_session() {
        let (store, service, identity) = setup().await;
        service.issue(&identity).await.unwrap();
        service.issue(&identity).await.unwrap();
        assert_eq!(service.revoke_all(identity.id).await.unwrap(), 2);
        assert_eq!(store.session_count(identity.id).await, 0);
    }
}
