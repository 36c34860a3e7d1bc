//! In-memory credential store and token ledger.
//!
//! Same semantics as the PostgreSQL implementations; used by tests and for
//! running the API without a database.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::AuthError;
use super::store::{CredentialStore, TokenLedger};
use crate::models::auth::{NewRefreshToken, Provider, ProviderToken, RefreshTokenRecord, Role, User};

/// In-memory users and providers.
#[derive(Default, Clone)]
pub struct MemoryCredentialStore {
    users: Arc<DashMap<i64, User>>,
    by_username: Arc<DashMap<String, i64>>,
    providers: Arc<DashMap<i64, Provider>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a provider with no token descriptor.
    pub fn insert_provider(&self, name: &str, description: &str) -> Provider {
        let provider = Provider {
            id: self.next_id(),
            name: name.to_string(),
            description: description.to_string(),
            token: None,
        };
        self.providers.insert(provider.id, provider.clone());
        provider
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self
            .by_username
            .get(username)
            .and_then(|id| self.users.get(id.value()).map(|r| r.value().clone())))
    }

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        match self.by_username.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AuthError::ValidationError(format!(
                "username '{username}' already exists"
            ))),
            Entry::Vacant(slot) => {
                let user = User {
                    id: self.next_id(),
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    role,
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn provider_by_id(&self, id: i64) -> Result<Option<Provider>, AuthError> {
        Ok(self.providers.get(&id).map(|r| r.value().clone()))
    }

    async fn set_provider_token(
        &self,
        provider_id: i64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut provider = self
            .providers
            .get_mut(&provider_id)
            .ok_or(AuthError::ProviderNotFound(provider_id))?;
        provider.token = Some(ProviderToken {
            jti: jti.to_string(),
            expires_at,
        });
        Ok(())
    }

    async fn clear_provider_token(&self, provider_id: i64) -> Result<(), AuthError> {
        let mut provider = self
            .providers
            .get_mut(&provider_id)
            .ok_or(AuthError::ProviderNotFound(provider_id))?;
        provider.token = None;
        Ok(())
    }
}

/// In-memory refresh-token ledger keyed by jti.
#[derive(Default, Clone)]
pub struct MemoryTokenLedger {
    records: Arc<DashMap<String, RefreshTokenRecord>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records owned by `subject_id`.
    pub fn records_for(&self, subject_id: i64) -> Vec<RefreshTokenRecord> {
        self.records
            .iter()
            .filter(|r| r.owner_subject_id == subject_id)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn create(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, AuthError> {
        match self.records.entry(token.jti.clone()) {
            Entry::Occupied(_) => Err(AuthError::Internal(format!(
                "duplicate ledger jti {}",
                token.jti
            ))),
            Entry::Vacant(slot) => {
                let record = RefreshTokenRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    owner_subject_id: token.owner_subject_id,
                    jti: token.jti,
                    expires_at: token.expires_at,
                    revoked: false,
                    created: Utc::now(),
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get_by_jti(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let now = Utc::now();
        Ok(self
            .records
            .get(jti)
            .filter(|r| r.expires_at > now)
            .map(|r| r.value().clone()))
    }

    async fn delete_by_jti(&self, jti: &str) -> Result<(), AuthError> {
        self.records.remove(jti);
        Ok(())
    }

    async fn mark_revoked(&self, jti: &str) -> Result<bool, AuthError> {
        Ok(match self.records.get_mut(jti) {
            Some(mut record) => {
                record.revoked = true;
                true
            }
            None => false,
        })
    }
}
