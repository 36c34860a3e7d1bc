//! PostgreSQL-backed credential store and refresh-token ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AuthError;
use super::store::{CredentialStore, TokenLedger};
use crate::models::auth::{NewRefreshToken, Provider, ProviderToken, RefreshTokenRecord, Role, User};

type UserRow = (i64, String, String, String);

fn user_from_row((id, username, password_hash, role): UserRow) -> Result<User, AuthError> {
    let role = role
        .parse::<Role>()
        .map_err(|e| AuthError::Internal(format!("user {id}: {e}")))?;
    Ok(User {
        id,
        username,
        password_hash,
        role,
    })
}

/// Users and providers stored in PostgreSQL.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(user_from_row).transpose()
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AuthError::ValidationError(format!("username '{username}' already exists"))
            }
            _ => AuthError::DbError(e),
        })?;
        Ok(User {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
        })
    }

    async fn provider_by_id(&self, id: i64) -> Result<Option<Provider>, AuthError> {
        let row = sqlx::query_as::<_, (i64, String, String, Option<String>, Option<DateTime<Utc>>)>(
            "SELECT id, name, description, jti, expiration FROM providers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, name, description, jti, expiration)| Provider {
            id,
            name,
            description,
            token: match (jti, expiration) {
                (Some(jti), Some(expires_at)) => Some(ProviderToken { jti, expires_at }),
                _ => None,
            },
        }))
    }

    async fn set_provider_token(
        &self,
        provider_id: i64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE providers SET jti = $2, expiration = $3, updated = now() WHERE id = $1",
        )
        .bind(provider_id)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() != 1 {
            return Err(AuthError::ProviderNotFound(provider_id));
        }
        Ok(())
    }

    async fn clear_provider_token(&self, provider_id: i64) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE providers SET jti = NULL, expiration = NULL, updated = now() WHERE id = $1",
        )
        .bind(provider_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() != 1 {
            return Err(AuthError::ProviderNotFound(provider_id));
        }
        Ok(())
    }
}

/// Refresh-token ledger stored in the `tokens` table.
#[derive(Clone)]
pub struct PgTokenLedger {
    pool: PgPool,
}

impl PgTokenLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenLedger for PgTokenLedger {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError> {
        let (id, created) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO tokens (user_id, jti, expiration) VALUES ($1, $2, $3) \
             RETURNING id, created",
        )
        .bind(token.owner_subject_id)
        .bind(&token.jti)
        .bind(token.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(RefreshTokenRecord {
            id,
            owner_subject_id: token.owner_subject_id,
            jti: token.jti,
            expires_at: token.expires_at,
            revoked: false,
            created,
        })
    }

    async fn get_by_jti(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, (i64, i64, String, DateTime<Utc>, bool, DateTime<Utc>)>(
            "SELECT id, user_id, jti, expiration, revoked, created \
             FROM tokens \
             WHERE jti = $1 AND expiration > now()",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(
            |(id, owner_subject_id, jti, expires_at, revoked, created)| RefreshTokenRecord {
                id,
                owner_subject_id,
                jti,
                expires_at,
                revoked,
                created,
            },
        ))
    }

    async fn delete_by_jti(&self, jti: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM tokens WHERE jti = $1")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE tokens SET revoked = TRUE WHERE jti = $1")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
