//! Credential store: persistence of identities and refresh sessions.
//!
//! The auth services only see the [`CredentialStore`] trait. Two backends
//! are provided: PostgreSQL for deployments and an in-memory map for tests
//! and local development.

mod memory;
mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::AuthResult;
use crate::models::auth::{Identity, IdentityWithSecret, NewIdentity, RefreshSession};

/// Storage contract consumed by the auth core.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Identity>>;

    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<Identity>>;

    async fn find_by_id_with_secret(&self, id: i64) -> AuthResult<Option<IdentityWithSecret>>;

    async fn find_by_phone_with_secret(
        &self,
        phone: &str,
    ) -> AuthResult<Option<IdentityWithSecret>>;

    /// Create an identity. Fails with `Validation` when the phone is taken.
    async fn create(&self, new: NewIdentity) -> AuthResult<Identity>;

    /// Persist role, status, password hash and password-change time.
    async fn save(&self, identity: &IdentityWithSecret) -> AuthResult<()>;

    /// Swap the password hash only while it still equals `current_hash`.
    /// Returns `false` when the row is gone or the hash already changed, so
    /// of two racing changes from the same starting hash only one lands.
    async fn replace_password(
        &self,
        identity_id: i64,
        current_hash: &str,
        new_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> AuthResult<bool>;

    async fn create_refresh_session(
        &self,
        identity_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshSession>;

    /// Find the session matching both the token digest and the identity.
    async fn find_refresh_session(
        &self,
        token_hash: &str,
        identity_id: i64,
    ) -> AuthResult<Option<RefreshSession>>;

    /// Delete a session. Returns `true` only for the caller that actually
    /// removed the row; concurrent callers racing on the same session see
    /// `false`.
    async fn delete_refresh_session(&self, session_id: Uuid) -> AuthResult<bool>;

    /// Delete every session of an identity, returning how many were removed.
    async fn delete_refresh_sessions_for(&self, identity_id: i64) -> AuthResult<u64>;
}
