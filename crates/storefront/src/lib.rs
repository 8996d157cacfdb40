//! Lumière storefront API.
//!
//! The service is built as a library so the router can be exercised in
//! tests without binding a socket; `main.rs` only wires configuration,
//! telemetry and the listener around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the full application router with its middleware stack.
///
/// Sentry layers are added by the binary, outside of this router.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().allowed_origins);

    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// CORS for the configured origins. With none configured no CORS headers are
/// sent and browsers fall back to same-origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use lumiere_core::{Email, Role, UserId};
    use secrecy::{ExposeSecret, SecretString};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::models::CurrentUser;

    const SECRET: &str = "kQ8#vN2$pL5@xR9!mT4&wZ7*bH3^cJ6%";

    // Never connects: every request below is answered before touching the pool.
    fn state_with_origins(origins: &[&str]) -> AppState {
        let mut config = StorefrontConfig::with_defaults(
            SecretString::from("postgres://lumiere@localhost/unused"),
            SecretString::from(SECRET),
        );
        config.allowed_origins = origins.iter().map(|o| (*o).to_owned()).collect();
        let pool = PgPoolOptions::new()
            .connect_lazy(config.database_url.expose_secret())
            .unwrap();
        AppState::new(config, pool).unwrap()
    }

    fn state() -> AppState {
        state_with_origins(&[])
    }

    fn token(state: &AppState, role: Role) -> String {
        state
            .tokens()
            .issue(&CurrentUser {
                id: UserId::new(1),
                email: Email::parse("anna@lumiere.shop").unwrap(),
                role,
            })
            .unwrap()
            .token
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.10")
    }

    async fn send(state: AppState, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(state).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn test_cart_requires_token() {
        let (status, body) = send(state(), request("GET", "/api/cart").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid() {
        let req = request("GET", "/api/orders")
            .header("authorization", "Bearer not.a.token")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(state(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_product_write_requires_admin() {
        let state = state();
        let req = request("POST", "/api/products")
            .header("authorization", format!("Bearer {}", token(&state, Role::User)))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"Rose Serum"}"#))
            .unwrap();
        let (status, body) = send(state, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Admin access required");
    }

    #[tokio::test]
    async fn test_product_delete_without_token() {
        let (status, _) = send(
            state(),
            request("DELETE", "/api/products/3").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_product_id() {
        let (status, body) = send(
            state(),
            request("GET", "/api/products/lipstick").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid product id");
    }

    #[tokio::test]
    async fn test_bad_listing_params() {
        let (status, body) = send(
            state(),
            request("GET", "/api/products?minPrice=cheap").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "minPrice must be a number");
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let req = request("POST", "/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let (status, body) = send(state(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_auth_action() {
        let (status, body) = send(
            state(),
            request("POST", "/api/auth?action=delete").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action");
    }

    #[tokio::test]
    async fn test_logout_action() {
        let (status, body) = send(
            state(),
            request("POST", "/api/auth?action=logout").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_profile_action_requires_token() {
        let (status, _) = send(
            state(),
            request("POST", "/api/auth?action=profile").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let req = request("OPTIONS", "/api/products")
            .header("origin", "https://lumiere.shop")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = app(state_with_origins(&["https://lumiere.shop"]))
            .oneshot(req)
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "https://lumiere.shop"
        );
    }

    #[tokio::test]
    async fn test_no_cors_headers_by_default() {
        let req = request("GET", "/health")
            .header("origin", "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app(state()).oneshot(req).await.unwrap();
        assert!(!response.headers().contains_key("access-control-allow-origin"));
    }
}
