//! Route access policy.

use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::models::auth::{ClaimKind, Claims, Role};

/// Role a route requires of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteRole {
    /// Everyone, no authentication.
    Public,
    /// Any valid claims.
    Authenticated,
    /// Users with the owner role.
    Owner,
    /// Provider tokens, or owners.
    Provider,
}

impl RouteRole {
    /// Check `claims` against this requirement.
    ///
    /// `MissingContext` when a non-public route sees no claims at all,
    /// `Forbidden` when the claims do not satisfy the role.
    pub fn check(self, claims: Option<&Claims>) -> Result<(), AuthError> {
        let claims = match (self, claims) {
            (RouteRole::Public, _) => return Ok(()),
            (_, None) => return Err(AuthError::MissingContext),
            (_, Some(claims)) => claims,
        };

        let allowed = match (self, claims.kind) {
            (RouteRole::Public | RouteRole::Authenticated, _) => true,
            (RouteRole::Owner, ClaimKind::User { role }) => role == Role::Owner,
            (RouteRole::Owner, ClaimKind::Provider { .. }) => false,
            (RouteRole::Provider, ClaimKind::Provider { .. }) => true,
            (RouteRole::Provider, ClaimKind::User { role }) => role == Role::Owner,
        };

        if allowed {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}
