//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Database readiness
//!
//! # Catalog
//! GET    /api/products         - Filtered, sorted, paginated listing
//! GET    /api/products/{id}    - Detail with reviews and similar products
//! POST   /api/products         - Create (admin)
//! PUT    /api/products/{id}    - Partial update (admin)
//! DELETE /api/products/{id}    - Delete (admin)
//! GET    /api/categories       - Category tree
//!
//! # Auth (register/login rate limited strictly)
//! POST /api/auth/register
//! POST /api/auth/login
//! POST /api/auth/logout
//! GET  /api/auth/profile       - Account and last 10 orders (user)
//! PUT  /api/auth/profile       - Update account (user)
//! POST /api/auth?action=...    - register|login|logout|profile|update
//!
//! # Cart (user)
//! GET    /api/cart
//! DELETE /api/cart             - Clear
//! POST   /api/cart/add
//! POST   /api/cart/update
//! POST   /api/cart/remove
//! POST   /api/cart/promo       - Apply promo code
//! DELETE /api/cart/promo       - Remove promo code
//!
//! # Orders (user)
//! GET  /api/orders
//! POST /api/orders             - Check out
//! GET  /api/orders/{id}
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Plain success acknowledgement.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Message {
    pub success: bool,
    pub message: &'static str,
}

impl Message {
    #[must_use]
    pub const fn ok(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

/// Parse a positive integer id from a path segment.
pub(crate) fn parse_id<T: From<i32>>(raw: &str, what: &str) -> Result<T> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .map(T::from)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {what} id")))
}

/// Endpoints that accept credentials.
fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", post(auth::dispatch))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(auth_rate_limiter())
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/categories", get(categories::index))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route(
            "/auth/profile",
            get(auth::profile).put(auth::update_profile),
        )
        .route("/cart", get(cart::show).delete(cart::clear))
        .route("/cart/add", post(cart::add))
        .route("/cart/update", post(cart::update))
        .route("/cart/remove", post(cart::remove))
        .route(
            "/cart/promo",
            post(cart::apply_promo).delete(cart::remove_promo),
        )
        .route("/orders", get(orders::index).post(orders::place))
        .route("/orders/{id}", get(orders::show))
}

/// All `/api` routes with their rate limits.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(catalog_routes())
        .merge(account_routes())
        .layer(api_rate_limiter())
        .merge(credential_routes())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
}

/// Liveness health check. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check: 503 until the database answers.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lumiere_core::{OrderId, ProductId};

    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id::<ProductId>("12", "product").unwrap(), ProductId::new(12));
        assert!(parse_id::<ProductId>("0", "product").is_err());
        assert!(parse_id::<ProductId>("-3", "product").is_err());
        let err = parse_id::<OrderId>("abc", "order").unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Invalid order id");
    }

    #[test]
    fn test_message_shape() {
        let json = serde_json::to_value(Message::ok("Logout successful")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": true, "message": "Logout successful" })
        );
    }
}
