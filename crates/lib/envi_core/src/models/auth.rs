//! Authentication domain models.
//!
//! Wire formats live next to the codec (`auth::codec`); the types here are the
//! closed, validated shapes the rest of the crate works with.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role held by an interactive user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Guest,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Guest => "guest",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "guest" => Ok(Role::Guest),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Whether a token represents a user session or a delegated provider credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    User,
    Provider,
}

impl ClaimType {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimType::User => "user",
            ClaimType::Provider => "provider",
        }
    }
}

impl FromStr for ClaimType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ClaimType::User),
            "provider" => Ok(ClaimType::Provider),
            other => Err(format!("unknown claim type '{other}'")),
        }
    }
}

/// Type-specific part of a claim set.
///
/// A user claim always carries a role, a provider claim always carries the id
/// of the provider it was delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    User { role: Role },
    Provider { provider_id: i64 },
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject: the user id, or for provider tokens the id of the issuing owner.
    pub subject_id: i64,
    pub kind: ClaimKind,
    /// Expiry, whole seconds.
    pub expires_at: DateTime<Utc>,
    /// Unique token id.
    pub jti: String,
}

impl Claims {
    /// Claims for a user session expiring `ttl` from now, with a fresh jti.
    pub fn user(subject_id: i64, role: Role, ttl: Duration) -> Self {
        Self::with_kind(subject_id, ClaimKind::User { role }, ttl)
    }

    /// Claims for a provider credential expiring `ttl` from now, with a fresh jti.
    pub fn provider(subject_id: i64, provider_id: i64, ttl: Duration) -> Self {
        Self::with_kind(subject_id, ClaimKind::Provider { provider_id }, ttl)
    }

    fn with_kind(subject_id: i64, kind: ClaimKind, ttl: Duration) -> Self {
        Self {
            subject_id,
            kind,
            expires_at: (Utc::now() + ttl).trunc_subsecs(0),
            jti: new_jti(),
        }
    }

    pub fn claim_type(&self) -> ClaimType {
        match self.kind {
            ClaimKind::User { .. } => ClaimType::User,
            ClaimKind::Provider { .. } => ClaimType::Provider,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self.kind {
            ClaimKind::User { role } => Some(role),
            ClaimKind::Provider { .. } => None,
        }
    }

    pub fn delegated_provider_id(&self) -> Option<i64> {
        match self.kind {
            ClaimKind::Provider { provider_id } => Some(provider_id),
            ClaimKind::User { .. } => None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Generate a fresh token id.
pub fn new_jti() -> String {
    Uuid::new_v4().to_string()
}

/// Interactive user with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// The single active token a provider may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderToken {
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Delegated, non-interactive credential holder.
#[derive(Debug, Clone)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub token: Option<ProviderToken>,
}

impl Provider {
    /// Whether `claims` match the currently stored descriptor and it has not expired.
    pub fn accepts(&self, claims: &Claims, now: DateTime<Utc>) -> bool {
        match &self.token {
            Some(t) => t.jti == claims.jti && t.expires_at > now,
            None => false,
        }
    }
}

/// Refresh token record stored in the ledger.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub owner_subject_id: i64,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created: DateTime<Utc>,
}

/// Input for creating a ledger record.
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub owner_subject_id: i64,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values_only() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("guest".parse::<Role>(), Ok(Role::Guest));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn user_claims_carry_role_and_no_provider() {
        let claims = Claims::user(7, Role::Guest, Duration::minutes(5));
        assert_eq!(claims.claim_type(), ClaimType::User);
        assert_eq!(claims.role(), Some(Role::Guest));
        assert_eq!(claims.delegated_provider_id(), None);
        assert_eq!(claims.expires_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn provider_claims_carry_provider_and_no_role() {
        let claims = Claims::provider(1, 9, Duration::hours(1));
        assert_eq!(claims.claim_type(), ClaimType::Provider);
        assert_eq!(claims.role(), None);
        assert_eq!(claims.delegated_provider_id(), Some(9));
    }

    #[test]
    fn fresh_claims_get_distinct_jtis() {
        let a = Claims::user(1, Role::Owner, Duration::minutes(1));
        let b = Claims::user(1, Role::Owner, Duration::minutes(1));
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn provider_accepts_only_current_unexpired_descriptor() {
        let claims = Claims::provider(1, 2, Duration::hours(1));
        let now = Utc::now();
        let mut provider = Provider {
            id: 2,
            name: "weather".into(),
            description: String::new(),
            token: Some(ProviderToken {
                jti: claims.jti.clone(),
                expires_at: claims.expires_at,
            }),
        };
        assert!(provider.accepts(&claims, now));

        provider.token = Some(ProviderToken {
            jti: new_jti(),
            expires_at: claims.expires_at,
        });
        assert!(!provider.accepts(&claims, now));

        provider.token = None;
        assert!(!provider.accepts(&claims, now));
    }
}
