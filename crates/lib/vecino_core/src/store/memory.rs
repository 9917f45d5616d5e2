//! In-memory credential store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::CredentialStore;
use crate::auth::{AuthError, AuthResult};
use crate::models::auth::{Identity, IdentityWithSecret, NewIdentity, RefreshSession};

#[derive(Default)]
struct Inner {
    next_id: i64,
    identities: HashMap<i64, IdentityWithSecret>,
    sessions: HashMap<Uuid, RefreshSession>,
}

/// Mutex-guarded map store. Every operation holds the lock for its whole
/// duration, so conditional deletes are atomic.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live session rows for an identity (expired rows included).
    pub async fn session_count(&self, identity_id: i64) -> usize {
        self.inner
            .lock()
            .await
            .sessions
            .values()
            .filter(|s| s.identity_id == identity_id)
            .count()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Identity>> {
        let inner = self.inner.lock().await;
        Ok(inner.identities.get(&id).map(|i| i.identity.clone()))
    }

    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<Identity>> {
        Ok(self
            .find_by_phone_with_secret(phone)
            .await?
            .map(|i| i.identity))
    }

    async fn find_by_id_with_secret(&self, id: i64) -> AuthResult<Option<IdentityWithSecret>> {
        let inner = self.inner.lock().await;
        Ok(inner.identities.get(&id).cloned())
    }

    async fn find_by_phone_with_secret(
        &self,
        phone: &str,
    ) -> AuthResult<Option<IdentityWithSecret>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .identities
            .values()
            .find(|i| i.identity.phone == phone)
            .cloned())
    }

    async fn create(&self, new: NewIdentity) -> AuthResult<Identity> {
        let mut inner = self.inner.lock().await;
        if inner.identities.values().any(|i| i.identity.phone == new.phone) {
            return Err(AuthError::Validation("Phone already registered".into()));
        }
        inner.next_id += 1;
        let identity = Identity {
            id: inner.next_id,
            phone: new.phone,
            role: new.role,
            status: new.status,
            created_at: Utc::now(),
            password_changed_at: None,
        };
        inner.identities.insert(
            identity.id,
            IdentityWithSecret {
                identity: identity.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(identity)
    }

    async fn save(&self, identity: &IdentityWithSecret) -> AuthResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.identities.get_mut(&identity.identity.id) {
            Some(row) => {
                *row = identity.clone();
                Ok(())
            }
            None => Err(AuthError::NotFound(format!(
                "identity {}",
                identity.identity.id
            ))),
        }
    }

    async fn replace_password(
        &self,
        identity_id: i64,
        current_hash: &str,
        new_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.identities.get_mut(&identity_id) {
            Some(row) if row.password_hash == current_hash => {
                row.password_hash = new_hash.to_string();
                row.identity.password_changed_at = Some(changed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_refresh_session(
        &self,
        identity_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshSession> {
        let session = RefreshSession {
            id: Uuid::now_v7(),
            identity_id,
            token_hash: token_hash.to_string(),
            issued_at: Utc::now(),
            expires_at,
        };
        self.inner
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_refresh_session(
        &self,
        token_hash: &str,
        identity_id: i64,
    ) -> AuthResult<Option<RefreshSession>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.token_hash == token_hash && s.identity_id == identity_id)
            .cloned())
    }

    async fn delete_refresh_session(&self, session_id: Uuid) -> AuthResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .sessions
            .remove(&session_id)
            .is_some())
    }

    async fn delete_refresh_sessions_for(&self, identity_id: i64) -> AuthResult<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.identity_id != identity_id);
        Ok((before - inner.sessions.len()) as u64)
    }
}
