//! Authentication request handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use envi_core::models::auth::ClaimType;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Authenticated;
use crate::routes;
use crate::services::cookies::{REFRESH_COOKIE, clear_auth_cookies, set_auth_cookies};

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Identity behind the current token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub subject_id: i64,
    pub delegated_provider_id: Option<i64>,
    pub claim_type: ClaimType,
}

/// `POST /auth` — authenticate with username + password.
///
/// Sets the `refresh` and `access` cookies on success; clears both on any failure.
pub async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, StatusCode), (CookieJar, AppError)> {
    let secure = state.config.secure_cookies;

    let Json(body) = body.map_err(|e| {
        (
            clear_auth_cookies(secure),
            AppError::Validation(e.body_text()),
        )
    })?;

    match state.service.login(&body.username, &body.password).await {
        Ok(pair) => Ok((
            set_auth_cookies(&pair.refresh, &pair.access, secure),
            StatusCode::OK,
        )),
        Err(e) => {
            warn!(kind = e.kind(), route = routes::AUTH, "login failed");
            Err((clear_auth_cookies(secure), e.into()))
        }
    }
}

/// `DELETE /auth` — clear both auth cookies.
///
/// The current access token stays valid until it expires.
pub async fn logout_handler(State(state): State<AppState>) -> (CookieJar, StatusCode) {
    (clear_auth_cookies(state.config.secure_cookies), StatusCode::OK)
}

/// `POST /auth/refresh` — rotate the `refresh` cookie into a new token pair.
///
/// Any failure is a bare 401 with no cookies set.
pub async fn refresh_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, StatusCode)> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            warn!(kind = "missing_token", route = routes::POST_AUTH_REFRESH, "refresh failed");
            AppError::Unauthorized("Authentication required".into())
        })?;

    let pair = state
        .service
        .validate_refresh_token(&token)
        .await
        .map_err(|e| {
            warn!(kind = e.kind(), route = routes::POST_AUTH_REFRESH, "refresh failed");
            AppError::from(e)
        })?;

    Ok((
        set_auth_cookies(&pair.refresh, &pair.access, state.config.secure_cookies),
        StatusCode::OK,
    ))
}

/// `GET /auth` — describe the identity behind the presented token.
pub async fn validate_handler(auth: Option<Authenticated>) -> AppResult<Json<ValidateResponse>> {
    let Authenticated(claims) =
        auth.ok_or_else(|| AppError::Validation("no claims attached to request".into()))?;
    Ok(Json(ValidateResponse {
        subject_id: claims.subject_id,
        delegated_provider_id: claims.delegated_provider_id(),
        claim_type: claims.claim_type(),
    }))
}
