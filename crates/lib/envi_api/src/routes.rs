//! Route paths.

pub const AUTH: &str = "/auth";
pub const POST_AUTH_REFRESH: &str = "/auth/refresh";
pub const PROVIDER_TOKEN: &str = "/providers/{id}/token";
