//! Cookie service — set/clear httpOnly auth cookies.
//!
//! Cookie names are fixed: `access` (path `/`) and `refresh` (scoped to the
//! refresh endpoint so browsers only send it there).

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;

use crate::routes;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "access";
/// Cookie name for the refresh token.
pub const REFRESH_COOKIE: &str = "refresh";

fn base(name: &'static str, value: String, path: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::None)
        .path(path)
        .build()
}

/// Build a httpOnly cookie for the access token.
pub fn access_cookie(token: &str, secure: bool) -> Cookie<'static> {
    base(ACCESS_COOKIE, token.to_string(), "/", secure)
}

/// Build a httpOnly cookie for the refresh token.
pub fn refresh_cookie(token: &str, secure: bool) -> Cookie<'static> {
    base(REFRESH_COOKIE, token.to_string(), routes::POST_AUTH_REFRESH, secure)
}

/// Build expired cookie to clear the access token.
pub fn clear_access_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = base(ACCESS_COOKIE, String::new(), "/", secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Build expired cookie to clear the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = base(REFRESH_COOKIE, String::new(), routes::POST_AUTH_REFRESH, secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Jar setting both auth cookies.
pub fn set_auth_cookies(refresh: &str, access: &str, secure: bool) -> CookieJar {
    CookieJar::new()
        .add(refresh_cookie(refresh, secure))
        .add(access_cookie(access, secure))
}

/// Jar clearing both auth cookies.
pub fn clear_auth_cookies(secure: bool) -> CookieJar {
    CookieJar::new()
        .add(clear_refresh_cookie(secure))
        .add(clear_access_cookie(secure))
}
