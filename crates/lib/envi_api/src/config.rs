//! API server configuration.

use envi_core::auth::AuthConfig;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Whether auth cookies carry the `Secure` flag.
    pub secure_cookies: bool,
    /// Token lifetimes, signing secret and hashing cost.
    pub auth: AuthConfig,
}
