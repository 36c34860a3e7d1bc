//! Persistence seams used by the token service.
//!
//! `queries` implements both traits over PostgreSQL, `memory` over in-process
//! maps. Implementations must tolerate concurrent use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::AuthError;
use crate::models::auth::{NewRefreshToken, Provider, RefreshTokenRecord, Role, User};

/// Principal lookup and provider token descriptors.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    /// Insert a user with an already-hashed password, returning the new user.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AuthError>;

    async fn provider_by_id(&self, id: i64) -> Result<Option<Provider>, AuthError>;

    /// Replace the provider's token descriptor. `ProviderNotFound` if no such provider.
    async fn set_provider_token(
        &self,
        provider_id: i64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Clear the provider's token descriptor. `ProviderNotFound` if no such provider.
    async fn clear_provider_token(&self, provider_id: i64) -> Result<(), AuthError>;
}

/// Live refresh-token records, keyed by jti.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError>;

    /// Fetch the record for `jti`. Records past their expiration read as absent.
    async fn get_by_jti(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, AuthError>;

    async fn delete_by_jti(&self, jti: &str) -> Result<(), AuthError>;

    /// Flag the record revoked. Returns whether a record was updated.
    async fn mark_revoked(&self, jti: &str) -> Result<bool, AuthError>;
}
