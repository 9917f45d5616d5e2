//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::CredentialStore;
use crate::auth::{AuthError, AuthResult};
use crate::models::auth::{Identity, IdentityWithSecret, NewIdentity, RefreshSession};

const IDENTITY_COLUMNS: &str = "id, phone, role::text, status::text, created_at, \
     password_changed_at, password_hash";

type IdentityRow = (
    i64,
    String,
    String,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    String,
);

type SessionRow = (Uuid, i64, String, DateTime<Utc>, DateTime<Utc>);

fn identity_from_row(row: IdentityRow) -> AuthResult<IdentityWithSecret> {
    let (id, phone, role, status, created_at, password_changed_at, password_hash) = row;
    Ok(IdentityWithSecret {
        identity: Identity {
            id,
            phone,
            role: role.parse().map_err(AuthError::StorageFailure)?,
            status: status.parse().map_err(AuthError::StorageFailure)?,
            created_at,
            password_changed_at,
        },
        password_hash,
    })
}

fn session_from_row(row: SessionRow) -> RefreshSession {
    let (id, identity_id, token_hash, issued_at, expires_at) = row;
    RefreshSession {
        id,
        identity_id,
        token_hash,
        issued_at,
        expires_at,
    }
}

/// sqlx-backed store over the `identities` and `refresh_sessions` tables.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations from `vecino_core/migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn fetch_identity(
        &self,
        filter: &str,
        bind: IdentityKey<'_>,
    ) -> AuthResult<Option<IdentityWithSecret>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE {filter}");
        let query = sqlx::query_as::<_, IdentityRow>(&sql);
        let row = match bind {
            IdentityKey::Id(id) => query.bind(id).fetch_optional(&self.pool).await?,
            IdentityKey::Phone(phone) => query.bind(phone).fetch_optional(&self.pool).await?,
        };
        row.map(identity_from_row).transpose()
    }
}

enum IdentityKey<'a> {
    Id(i64),
    Phone(&'a str),
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_id(&self, id: i64) -> AuthResult<Option<Identity>> {
        Ok(self
            .find_by_id_with_secret(id)
            .await?
            .map(|i| i.identity))
    }

    async fn find_by_phone(&self, phone: &str) -> AuthResult<Option<Identity>> {
        Ok(self
            .find_by_phone_with_secret(phone)
            .await?
            .map(|i| i.identity))
    }

    async fn find_by_id_with_secret(&self, id: i64) -> AuthResult<Option<IdentityWithSecret>> {
        self.fetch_identity("id = $1", IdentityKey::Id(id)).await
    }

    async fn find_by_phone_with_secret(
        &self,
        phone: &str,
    ) -> AuthResult<Option<IdentityWithSecret>> {
        self.fetch_identity("phone = $1", IdentityKey::Phone(phone))
            .await
    }

    async fn create(&self, new: NewIdentity) -> AuthResult<Identity> {
        let sql = format!(
            "INSERT INTO identities (phone, password_hash, role, status) \
             VALUES ($1, $2, $3::identity_role, $4::identity_status) \
             RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(&new.phone)
            .bind(&new.password_hash)
            .bind(new.role.as_str())
            .bind(new.status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AuthError::Validation("Phone already registered".into())
                }
                other => AuthError::Db(other),
            })?;
        Ok(identity_from_row(row)?.identity)
    }

    async fn save(&self, identity: &IdentityWithSecret) -> AuthResult<()> {
        let result = sqlx::query(
            "UPDATE identities \
             SET role = $2::identity_role, status = $3::identity_status, \
                 password_hash = $4, password_changed_at = $5 \
             WHERE id = $1",
        )
        .bind(identity.identity.id)
        .bind(identity.identity.role.as_str())
        .bind(identity.identity.status.as_str())
        .bind(&identity.password_hash)
        .bind(identity.identity.password_changed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound(format!(
                "identity {}",
                identity.identity.id
            )));
        }
        Ok(())
    }

    async fn replace_password(
        &self,
        identity_id: i64,
        current_hash: &str,
        new_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE identities SET password_hash = $3, password_changed_at = $4 \
             WHERE id = $1 AND password_hash = $2",
        )
        .bind(identity_id)
        .bind(current_hash)
        .bind(new_hash)
        .bind(changed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn create_refresh_session(
        &self,
        identity_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<RefreshSession> {
        let row = sqlx::query_as::<_, SessionRow>(
            "INSERT INTO refresh_sessions (id, identity_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, identity_id, token_hash, issued_at, expires_at",
        )
        .bind(Uuid::now_v7())
        .bind(identity_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(session_from_row(row))
    }

    async fn find_refresh_session(
        &self,
        token_hash: &str,
        identity_id: i64,
    ) -> AuthResult<Option<RefreshSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, identity_id, token_hash, issued_at, expires_at \
             FROM refresh_sessions \
             WHERE token_hash = $1 AND identity_id = $2",
        )
        .bind(token_hash)
        .bind(identity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(session_from_row))
    }

    async fn delete_refresh_session(&self, session_id: Uuid) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_refresh_sessions_for(&self, identity_id: i64) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE identity_id = $1")
            .bind(identity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
