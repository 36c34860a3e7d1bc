//! Authentication and authorization logic.
//!
//! Provides the claim codec, password hashing, the credential store and
//! refresh-token ledger seams, and the token service that ties them together.

pub mod codec;
pub mod memory;
pub mod password;
pub mod policy;
pub mod queries;
pub mod secret;
pub mod service;
pub mod store;

use chrono::Duration;
use thiserror::Error;

pub use codec::ClaimCodec;
pub use policy::RouteRole;
pub use service::{TokenPair, TokenService};
pub use store::{CredentialStore, TokenLedger};

/// Default access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_MINUTES: i64 = 7 * 24 * 60;

/// Default bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username lookup missed. Never surfaced to clients as distinct from
    /// `CredentialError`.
    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token format error: {0}")]
    TokenFormat(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed claims: {0}")]
    MalformedClaims(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Insufficient role")]
    Forbidden,

    #[error("Missing authentication context")]
    MissingContext,

    #[error("Provider not found: {0}")]
    ProviderNotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable, log-safe name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::PrincipalNotFound => "principal_not_found",
            AuthError::CredentialError => "credential_error",
            AuthError::TokenFormat(_) => "token_format",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::MalformedClaims(_) => "malformed_claims",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotFound => "token_not_found",
            AuthError::TokenRevoked => "token_revoked",
            AuthError::Forbidden => "forbidden",
            AuthError::MissingContext => "missing_context",
            AuthError::ProviderNotFound(_) => "provider_not_found",
            AuthError::ValidationError(_) => "validation_error",
            AuthError::DbError(_) => "db_error",
            AuthError::Internal(_) => "internal",
        }
    }
}

/// Token and hashing parameters.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HMAC signing secret.
    pub jwt_secret: String,
    /// bcrypt work factor used when hashing new passwords.
    pub bcrypt_cost: u32,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl AuthConfig {
    /// Config with the default lifetimes and cost.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            access_ttl: Duration::minutes(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::minutes(DEFAULT_REFRESH_TTL_MINUTES),
        }
    }
}
