//! Integration test — build the router over in-memory stores and drive the
//! login, refresh, validate and provider token flows end to end.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use envi_api::{AppState, config::ApiConfig};
use envi_core::auth::memory::{MemoryCredentialStore, MemoryTokenLedger};
use envi_core::auth::{AuthConfig, ClaimCodec, TokenService};
use envi_core::models::auth::{ClaimKind, Role};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct Harness {
    app: Router,
    service: TokenService,
    store: MemoryCredentialStore,
}

async fn harness() -> Harness {
    let store = MemoryCredentialStore::new();
    let ledger = MemoryTokenLedger::new();
    let mut auth = AuthConfig::new(SECRET);
    auth.bcrypt_cost = 4;

    let service = TokenService::new(Arc::new(store.clone()), Arc::new(ledger), auth.clone());
    service
        .create_user("owner", "owner-pw", Role::Owner)
        .await
        .expect("create owner");
    service
        .create_user("guest", "guest-pw", Role::Guest)
        .await
        .expect("create guest");

    let state = AppState {
        service: service.clone(),
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            secure_cookies: false,
            auth,
        },
    };

    Harness {
        app: envi_api::router(state),
        service,
        store,
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("request")
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "username": username, "password": password }).to_string(),
        ))
        .unwrap()
}

fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn cookie_value(resp: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(resp).into_iter().find_map(|c| {
        c.split(';')
            .next()
            .and_then(|pair| pair.strip_prefix(&prefix))
            .map(str::to_string)
    })
}

async fn login(app: &Router, username: &str, password: &str) -> (String, String) {
    let resp = send(app, login_request(username, password)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    (
        cookie_value(&resp, "refresh").expect("refresh cookie"),
        cookie_value(&resp, "access").expect("access cookie"),
    )
}

fn validate_with_cookie(access: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/auth")
        .header(header::COOKIE, format!("access={access}"))
        .body(Body::empty())
        .unwrap()
}

fn validate_with_bearer(token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/auth")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn refresh_request(refresh: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .header(header::COOKIE, format!("refresh={refresh}"))
        .body(Body::empty())
        .unwrap()
}

async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

#[tokio::test]
async fn login_sets_both_cookies_with_user_claims() {
    let h = harness().await;
    let resp = send(&h.app, login_request("owner", "owner-pw")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 2);
    for c in &cookies {
        assert!(c.contains("HttpOnly"), "cookie not httpOnly: {c}");
        assert!(c.contains("SameSite=None"), "cookie missing SameSite: {c}");
    }
    assert!(cookies.iter().any(|c| c.starts_with("refresh=") && c.contains("Path=/auth/refresh")));

    let access = cookie_value(&resp, "access").unwrap();
    let claims = ClaimCodec::new(SECRET.as_bytes()).decode(&access).unwrap();
    assert_eq!(claims.kind, ClaimKind::User { role: Role::Owner });
}

#[tokio::test]
async fn failed_login_clears_cookies() {
    let h = harness().await;
    let resp = send(&h.app, login_request("owner", "wrong")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    let resp = send(&h.app, login_request("nobody", "owner-pw")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_login_body_is_bad_request() {
    let h = harness().await;
    let req = Request::builder()
        .method("POST")
        .uri("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\":"))
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn refresh_rotates_and_rejects_reuse() {
    let h = harness().await;
    let (refresh, _) = login(&h.app, "owner", "owner-pw").await;

    let resp = send(&h.app, refresh_request(&refresh)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated = cookie_value(&resp, "refresh").expect("rotated refresh cookie");
    assert_ne!(rotated, refresh);
    assert!(cookie_value(&resp, "access").is_some());

    let resp = send(&h.app, refresh_request(&refresh)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&resp).is_empty());

    let resp = send(&h.app, refresh_request(&rotated)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let h = harness().await;
    let req = Request::builder()
        .method("POST")
        .uri("/auth/refresh")
        .body(Body::empty())
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&resp).is_empty());
}

#[tokio::test]
async fn access_token_cannot_be_used_to_refresh() {
    let h = harness().await;
    let (_, access) = login(&h.app, "owner", "owner-pw").await;
    let resp = send(&h.app, refresh_request(&access)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validate_reports_owner_identity() {
    let h = harness().await;
    let (_, access) = login(&h.app, "owner", "owner-pw").await;

    let resp = send(&h.app, validate_with_cookie(&access)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["claimType"], "user");
    assert!(json["delegatedProviderId"].is_null());
    assert!(json["subjectId"].is_i64());
}

#[tokio::test]
async fn validate_forbids_guest() {
    let h = harness().await;
    let (_, access) = login(&h.app, "guest", "guest-pw").await;
    let resp = send(&h.app, validate_with_cookie(&access)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validate_without_token_is_unauthorized() {
    let h = harness().await;
    let req = Request::builder()
        .method("GET")
        .uri("/auth")
        .body(Body::empty())
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_is_used_when_cookie_is_invalid() {
    let h = harness().await;
    let (_, access) = login(&h.app, "owner", "owner-pw").await;
    let req = Request::builder()
        .method("GET")
        .uri("/auth")
        .header(header::COOKIE, "access=not-a-token")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn non_bearer_scheme_is_unauthorized() {
    let h = harness().await;
    let (_, access) = login(&h.app, "owner", "owner-pw").await;
    let req = Request::builder()
        .method("GET")
        .uri("/auth")
        .header(header::AUTHORIZATION, format!("Basic {access}"))
        .body(Body::empty())
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_requires_owner_and_clears_cookies() {
    let h = harness().await;

    let (_, guest_access) = login(&h.app, "guest", "guest-pw").await;
    let req = Request::builder()
        .method("DELETE")
        .uri("/auth")
        .header(header::COOKIE, format!("access={guest_access}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.app, req).await.status(), StatusCode::FORBIDDEN);

    let (_, access) = login(&h.app, "owner", "owner-pw").await;
    let req = Request::builder()
        .method("DELETE")
        .uri("/auth")
        .header(header::COOKIE, format!("access={access}"))
        .body(Body::empty())
        .unwrap();
    let resp = send(&h.app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));

    // Access tokens are stateless: the old one still validates after logout.
    let resp = send(&h.app, validate_with_cookie(&access)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

fn provider_token_request(method: &str, provider_id: i64, access: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(format!("/providers/{provider_id}/token"))
        .header(header::COOKIE, format!("access={access}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn provider_token_lifecycle() {
    let h = harness().await;
    let provider = h.store.insert_provider("sensor", "temperature feed");
    let (_, access) = login(&h.app, "owner", "owner-pw").await;

    let resp = send(
        &h.app,
        provider_token_request(
            "POST",
            provider.id,
            &access,
            Body::from(r#"{"lifespan":30}"#),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let token = json_body(resp).await.as_str().expect("token string").to_string();

    let resp = send(&h.app, validate_with_bearer(&token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = json_body(resp).await;
    assert_eq!(json["claimType"], "provider");
    assert_eq!(json["delegatedProviderId"], provider.id);

    // Provider tokens cannot reach owner-only routes.
    let req = Request::builder()
        .method("DELETE")
        .uri("/auth")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.app, req).await.status(), StatusCode::FORBIDDEN);

    let resp = send(
        &h.app,
        provider_token_request("DELETE", provider.id, &access, Body::empty()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let resp = send(&h.app, validate_with_bearer(&token)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn provider_token_for_unknown_provider_is_not_found() {
    let h = harness().await;
    let (_, access) = login(&h.app, "owner", "owner-pw").await;
    let resp = send(
        &h.app,
        provider_token_request("POST", 999, &access, Body::from(r#"{"lifespan":30}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_token_rejects_non_positive_lifespan() {
    let h = harness().await;
    let provider = h.store.insert_provider("sensor", "");
    let (_, access) = login(&h.app, "owner", "owner-pw").await;
    let resp = send(
        &h.app,
        provider_token_request("POST", provider.id, &access, Body::from(r#"{"lifespan":0}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reissuing_provider_token_invalidates_previous() {
    let h = harness().await;
    let provider = h.store.insert_provider("sensor", "");
    let user = h
        .service
        .create_user("second-owner", "pw", Role::Owner)
        .await
        .unwrap();

    let first = h
        .service
        .issue_provider_token(user.id, provider.id, chrono::Duration::days(1))
        .await
        .unwrap();
    let second = h
        .service
        .issue_provider_token(user.id, provider.id, chrono::Duration::days(1))
        .await
        .unwrap();

    let resp = send(&h.app, validate_with_bearer(&first)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = send(&h.app, validate_with_bearer(&second)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
