//! Authentication and authorization middleware.
//!
//! `authenticate` resolves a token (access cookie first, then
//! `Authorization: Bearer`) into claims and attaches them to the request as
//! [`Authenticated`]. `authorize` then checks those claims against the
//! route's [`RouteRole`]. Both short-circuit on failure and run the wrapped
//! handler at most once.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use envi_core::auth::{AuthError, RouteRole};
use envi_core::models::auth::Claims;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::AppError;
use crate::services::cookies::ACCESS_COOKIE;

/// Claims of an authenticated request, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Claims);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or_else(|| AuthError::MissingContext.into())
    }
}

impl<S> OptionalFromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Authenticated>().cloned())
    }
}

/// Where a token was found.
#[derive(Debug, Clone, Copy)]
enum TokenSource {
    Cookie,
    Bearer,
}

impl TokenSource {
    fn name(self) -> &'static str {
        match self {
            TokenSource::Cookie => "cookie",
            TokenSource::Bearer => "bearer",
        }
    }

    fn extract(self, headers: &HeaderMap) -> Option<String> {
        match self {
            TokenSource::Cookie => CookieJar::from_headers(headers)
                .get(ACCESS_COOKIE)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty()),
            TokenSource::Bearer => headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Axum middleware: authenticates the request and injects [`Authenticated`].
///
/// The first source yielding a token that passes validation wins; a cookie
/// that fails validation falls through to the bearer header.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut failure = None;

    for source in [TokenSource::Cookie, TokenSource::Bearer] {
        let Some(token) = source.extract(request.headers()) else {
            continue;
        };
        match state.service.authenticate(&token).await {
            Ok(claims) => {
                debug!(
                    source = source.name(),
                    subject_id = claims.subject_id,
                    claim_type = claims.claim_type().as_str(),
                    "request authenticated"
                );
                request.extensions_mut().insert(Authenticated(claims));
                return Ok(next.run(request).await);
            }
            Err(e) => {
                debug!(source = source.name(), kind = e.kind(), "token rejected");
                failure = Some(e);
            }
        }
    }

    let path = request.uri().path();
    match failure {
        Some(e) => {
            warn!(kind = e.kind(), route = %path, "authentication failed");
            Err(e.into())
        }
        None => {
            warn!(kind = "missing_token", route = %path, "authentication failed");
            Err(AppError::Unauthorized("Authentication required".into()))
        }
    }
}

/// Axum middleware: enforces the route's required role against [`Authenticated`] claims.
///
/// Mount with `from_fn_with_state(role, authorize)` inside `authenticate`.
pub async fn authorize(
    State(required): State<RouteRole>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = request.extensions().get::<Authenticated>().map(|a| &a.0);
    if let Err(e) = required.check(claims) {
        warn!(
            kind = e.kind(),
            subject_id = claims.map(|c| c.subject_id),
            required = ?required,
            route = %request.uri().path(),
            "authorization failed"
        );
        return Err(e.into());
    }
    Ok(next.run(request).await)
}
