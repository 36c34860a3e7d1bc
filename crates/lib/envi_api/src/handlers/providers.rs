//! Provider token request handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Duration;
use serde::Deserialize;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Authenticated;

/// Longest lifespan a provider token may be issued with, in days.
const MAX_LIFESPAN_DAYS: i64 = 3650;

/// Provider token request body.
#[derive(Debug, Deserialize)]
pub struct ProviderTokenRequest {
    /// Lifespan in days.
    pub lifespan: i64,
}

/// `POST /providers/{id}/token` — issue a token for a provider, replacing any previous one.
pub async fn issue_provider_token_handler(
    State(state): State<AppState>,
    Authenticated(claims): Authenticated,
    Path(provider_id): Path<i64>,
    Json(body): Json<ProviderTokenRequest>,
) -> AppResult<(StatusCode, Json<String>)> {
    if !(1..=MAX_LIFESPAN_DAYS).contains(&body.lifespan) {
        return Err(AppError::Validation(format!(
            "lifespan must be between 1 and {MAX_LIFESPAN_DAYS} days"
        )));
    }

    let token = state
        .service
        .issue_provider_token(claims.subject_id, provider_id, Duration::days(body.lifespan))
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}

/// `DELETE /providers/{id}/token` — revoke the provider's current token.
pub async fn revoke_provider_token_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.service.revoke_provider_token(provider_id).await?;
    Ok(StatusCode::ACCEPTED)
}
