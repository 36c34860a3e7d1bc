//! Password hashing via bcrypt.
//!
//! bcrypt is deliberately slow; the async variants run it on the blocking
//! pool so token validation traffic never waits behind a hash.

use super::AuthError;

/// Well-formed bcrypt hash (cost 10) that matches no password in use.
/// Verified against when a username is unknown so both login failure paths cost the same.
pub const DUMMY_HASH: &str = "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Verify a password against a bcrypt hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash).map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}

/// [`hash_password`] on the blocking thread pool.
pub async fn hash_password_async(password: String, cost: u32) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("bcrypt task: {e}")))?
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_async(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("bcrypt task: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22", 4).unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn dummy_hash_is_well_formed() {
        assert!(!verify_password("anything", DUMMY_HASH).unwrap());
    }

    #[test]
    fn malformed_hash_is_internal_error() {
        assert!(matches!(
            verify_password("x", "not-a-hash"),
            Err(AuthError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn async_variants_agree() {
        let hash = hash_password_async("s3cret".into(), 4).await.unwrap();
        assert!(verify_password_async("s3cret".into(), hash.clone()).await.unwrap());
        assert!(!verify_password_async("nope".into(), hash).await.unwrap());
    }
}
