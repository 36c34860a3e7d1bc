//! Signing secret resolution.

use std::path::PathBuf;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{info, warn};

/// Resolve the JWT secret: explicit value → env `JWT_SECRET` → `AUTH_SECRET` → persisted file.
///
/// When nothing is configured a 64-char secret is generated and written to
/// the platform data directory so tokens survive restarts.
pub fn resolve_jwt_secret(explicit: Option<&str>) -> String {
    if let Some(secret) = explicit
        && !secret.is_empty()
    {
        return secret.to_string();
    }
    for var in ["JWT_SECRET", "AUTH_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }

    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new JWT secret"),
        Err(e) => warn!(path = %secret_path.display(), "could not persist JWT secret: {e}"),
    }
    secret
}

fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("envi")
        .join("jwt-secret")
}
