//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use envi_core::auth::AuthError;
use serde::Serialize;
use thiserror::Error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database unavailable: {0}")]
    DbUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::DbUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "db_unavailable", m.as_str())
            }
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        if let AppError::Internal(detail) = &self {
            tracing::error!("internal error: {detail}");
        }
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DbUnavailable("database unavailable".into())
            }
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::PrincipalNotFound | AuthError::CredentialError => {
                AppError::Unauthorized("Invalid credentials".into())
            }
            AuthError::TokenFormat(_)
            | AuthError::InvalidSignature
            | AuthError::MalformedClaims(_)
            | AuthError::TokenExpired
            | AuthError::TokenNotFound
            | AuthError::TokenRevoked => AppError::Unauthorized("Invalid or expired token".into()),
            AuthError::MissingContext => AppError::Unauthorized("Authentication required".into()),
            AuthError::Forbidden => AppError::Forbidden("Insufficient role".into()),
            AuthError::ProviderNotFound(id) => AppError::NotFound(format!("provider {id}")),
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::DbError(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_share_one_message() {
        let kinds = [
            AuthError::TokenFormat("x".into()),
            AuthError::InvalidSignature,
            AuthError::MalformedClaims("x".into()),
            AuthError::TokenExpired,
            AuthError::TokenNotFound,
            AuthError::TokenRevoked,
        ];
        for kind in kinds {
            match AppError::from(kind) {
                AppError::Unauthorized(m) => assert_eq!(m, "Invalid or expired token"),
                other => panic!("unexpected mapping: {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_user_and_wrong_password_are_indistinguishable() {
        let a = AppError::from(AuthError::PrincipalNotFound).to_string();
        let b = AppError::from(AuthError::CredentialError).to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (AppError::from(AuthError::Forbidden), StatusCode::FORBIDDEN),
            (AppError::from(AuthError::MissingContext), StatusCode::UNAUTHORIZED),
            (AppError::from(AuthError::ProviderNotFound(4)), StatusCode::NOT_FOUND),
            (
                AppError::from(AuthError::ValidationError("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(AuthError::Internal("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
