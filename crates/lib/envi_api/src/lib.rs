//! # envi_api
//!
//! HTTP authentication layer for Envi.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

use axum::Router;
use axum::routing::{delete, get, post};
use envi_core::auth::{RouteRole, TokenService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, providers};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token service backed by the credential store and ledger.
    pub service: TokenService,
    /// API configuration.
    pub config: ApiConfig,
}

/// Wrap `router` in the authentication and authorization stages for `role`.
///
/// `Public` routes are returned untouched and never see the authentication stage.
fn gate(router: Router<AppState>, role: RouteRole, state: &AppState) -> Router<AppState> {
    match role {
        RouteRole::Public => router,
        _ => router
            .layer(axum::middleware::from_fn_with_state(
                role,
                middleware::auth::authorize,
            ))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::authenticate,
            )),
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route(routes::AUTH, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler));

    let provider = Router::new().route(routes::AUTH, get(auth::validate_handler));

    let owner = Router::new()
        .route(routes::AUTH, delete(auth::logout_handler))
        .route(
            routes::PROVIDER_TOKEN,
            post(providers::issue_provider_token_handler)
                .delete(providers::revoke_provider_token_handler),
        );

    Router::new()
        .merge(gate(public, RouteRole::Public, &state))
        .merge(gate(provider, RouteRole::Provider, &state))
        .merge(gate(owner, RouteRole::Owner, &state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
