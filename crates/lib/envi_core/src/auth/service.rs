//! Token service — login, validation, refresh rotation and provider tokens.
//!
//! Access tokens are stateless: only signature and expiry are checked, so a
//! user access token stays valid until it expires even after logout.
//! Refresh tokens are backed by the ledger and rotated on every use.
//! Provider tokens are checked against the single descriptor stored on the
//! provider, so revoking it cuts off every outstanding copy at once.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::codec::ClaimCodec;
use super::password::{DUMMY_HASH, hash_password_async, verify_password_async};
use super::store::{CredentialStore, TokenLedger};
use super::{AuthConfig, AuthError};
use crate::models::auth::{ClaimKind, Claims, NewRefreshToken, Role, User};

/// A freshly issued refresh/access token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// Issues, validates and rotates tokens.
#[derive(Clone)]
pub struct TokenService {
    credentials: Arc<dyn CredentialStore>,
    ledger: Arc<dyn TokenLedger>,
    codec: ClaimCodec,
    config: AuthConfig,
}

impl TokenService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        ledger: Arc<dyn TokenLedger>,
        config: AuthConfig,
    ) -> Self {
        let codec = ClaimCodec::new(config.jwt_secret.as_bytes());
        Self {
            credentials,
            ledger,
            codec,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate with username + password and issue a token pair.
    ///
    /// Unknown usernames and wrong passwords both yield `CredentialError`;
    /// only the log line tells them apart.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = match self.credentials.user_by_username(username).await? {
            Some(user) => user,
            None => {
                // Burn the same bcrypt cost as a real check.
                let _ =
                    verify_password_async(password.to_string(), DUMMY_HASH.to_string()).await;
                info!(reason = AuthError::PrincipalNotFound.kind(), "login rejected");
                return Err(AuthError::CredentialError);
            }
        };

        if !verify_password_async(password.to_string(), user.password_hash.clone()).await? {
            info!(subject_id = user.id, reason = "wrong_password", "login rejected");
            return Err(AuthError::CredentialError);
        }

        let pair = self.issue_token_pair(user.id, user.role).await?;
        info!(subject_id = user.id, role = %user.role, "login succeeded");
        Ok(pair)
    }

    /// Issue a ledger-backed refresh token and an unpersisted access token for a user.
    ///
    /// The two tokens carry different jtis; only the refresh jti is recorded.
    pub async fn issue_token_pair(
        &self,
        subject_id: i64,
        role: Role,
    ) -> Result<TokenPair, AuthError> {
        let refresh_claims = Claims::user(subject_id, role, self.config.refresh_ttl);
        let refresh = self.codec.encode(&refresh_claims)?;

        let access_claims = Claims::user(subject_id, role, self.config.access_ttl);
        let access = self.codec.encode(&access_claims)?;

        self.ledger
            .create(NewRefreshToken {
                owner_subject_id: subject_id,
                jti: refresh_claims.jti,
                expires_at: refresh_claims.expires_at,
            })
            .await?;

        Ok(TokenPair { refresh, access })
    }

    /// Decode `token` and check its expiry. Does not consult the ledger.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.codec.decode(token)?;
        if claims.is_expired_at(Utc::now()) {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// [`validate_token`](Self::validate_token), plus the stored-descriptor
    /// check for provider tokens.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.validate_token(token)?;
        if let ClaimKind::Provider { provider_id } = claims.kind {
            let provider = self.credentials.provider_by_id(provider_id).await?;
            let current = provider.is_some_and(|p| p.accepts(&claims, Utc::now()));
            if !current {
                debug!(provider_id, "provider token no longer matches stored descriptor");
                return Err(AuthError::TokenRevoked);
            }
        }
        Ok(claims)
    }

    /// Rotate a refresh token: validate it, check the ledger, issue a new
    /// pair, then delete the old record.
    ///
    /// The new pair is issued before the old record is deleted. A failure in
    /// between leaves two valid refresh tokens rather than none.
    pub async fn validate_refresh_token(&self, token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(token)?;

        let record = self
            .ledger
            .get_by_jti(&claims.jti)
            .await?
            .filter(|r| r.owner_subject_id == claims.subject_id)
            .ok_or(AuthError::TokenNotFound)?;
        if record.revoked {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .credentials
            .user_by_id(claims.subject_id)
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        let pair = self.issue_token_pair(user.id, user.role).await?;

        if let Err(e) = self.ledger.delete_by_jti(&claims.jti).await {
            warn!(subject_id = user.id, "old refresh token left in ledger after rotation: {e}");
            return Err(e);
        }

        debug!(subject_id = user.id, "refresh token rotated");
        Ok(pair)
    }

    /// Blocklist a refresh token without deleting its ledger record.
    pub async fn revoke_refresh_token(&self, jti: &str) -> Result<(), AuthError> {
        if !self.ledger.mark_revoked(jti).await? {
            return Err(AuthError::TokenNotFound);
        }
        info!("refresh token revoked");
        Ok(())
    }

    /// Issue a long-lived token for `provider_id`, replacing any previous one.
    ///
    /// `issuer_id` (the owner creating the token) becomes the token subject.
    pub async fn issue_provider_token(
        &self,
        issuer_id: i64,
        provider_id: i64,
        lifespan: Duration,
    ) -> Result<String, AuthError> {
        if lifespan <= Duration::zero() {
            return Err(AuthError::ValidationError("lifespan must be positive".into()));
        }

        let claims = Claims::provider(issuer_id, provider_id, lifespan);
        let token = self.codec.encode(&claims)?;
        self.credentials
            .set_provider_token(provider_id, &claims.jti, claims.expires_at)
            .await?;

        info!(
            subject_id = issuer_id,
            provider_id,
            expires_at = %claims.expires_at,
            "provider token issued"
        );
        Ok(token)
    }

    /// Clear the provider's stored descriptor, invalidating its current token.
    pub async fn revoke_provider_token(&self, provider_id: i64) -> Result<(), AuthError> {
        self.credentials.clear_provider_token(provider_id).await?;
        info!(provider_id, "provider token revoked");
        Ok(())
    }

    /// Hash `password` with the configured cost and store a new user.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        if username.is_empty() {
            return Err(AuthError::ValidationError("username cannot be empty".into()));
        }
        if password.is_empty() {
            return Err(AuthError::ValidationError("password cannot be empty".into()));
        }
        let hash = hash_password_async(password.to_string(), self.config.bcrypt_cost).await?;
        let user = self.credentials.create_user(username, &hash, role).await?;
        info!(subject_id = user.id, role = %role, "user created");
        Ok(user)
    }
}
