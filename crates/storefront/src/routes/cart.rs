//! Cart route handlers.
//!
//! Every response carries the full cart with freshly computed totals, so
//! clients never have to price anything themselves.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumiere_core::ProductId;

use crate::error::{JsonBody, Result};
use crate::middleware::RequireUser;
use crate::services::cart::{CartService, CartView};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBody {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

const fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBody {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct PromoBody {
    #[serde(default, alias = "promoCode")]
    pub code: String,
}

/// Cart plus an optional human-readable outcome.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub cart: CartView,
}

impl CartResponse {
    fn new(cart: CartView, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            cart,
        }
    }
}

/// Current cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.pool()).view(user.id).await?;
    Ok(Json(CartResponse {
        success: true,
        message: None,
        cart,
    }))
}

/// Add a product, merging with an existing line.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<AddBody>,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.pool())
        .add(user.id, body.product_id, body.quantity, body.attributes)
        .await?;
    Ok(Json(CartResponse::new(cart, "Product added to cart")))
}

/// Set a line's quantity.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<UpdateBody>,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.pool())
        .set_quantity(user.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(CartResponse::new(cart, "Cart updated")))
}

/// Remove a line.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<RemoveBody>,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.pool())
        .remove(user.id, body.product_id)
        .await?;
    Ok(Json(CartResponse::new(cart, "Product removed from cart")))
}

/// Empty the cart.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.pool()).clear(user.id).await?;
    Ok(Json(CartResponse::new(cart, "Cart cleared")))
}

/// Activate a promo code.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn apply_promo(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<PromoBody>,
) -> Result<Json<CartResponse>> {
    let (promo, cart) = CartService::new(state.pool())
        .apply_promo(user.id, &body.code)
        .await?;
    Ok(Json(CartResponse::new(cart, promo.activation_message())))
}

/// Deactivate the promo code.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove_promo(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartResponse>> {
    let cart = CartService::new(state.pool()).remove_promo(user.id).await?;
    Ok(Json(CartResponse::new(cart, "Promo code removed")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_body_defaults() {
        let body: AddBody = serde_json::from_str(r#"{"productId": 3}"#).unwrap();
        assert_eq!(body.product_id, ProductId::new(3));
        assert_eq!(body.quantity, 1);
        assert!(body.attributes.is_empty());
    }

    #[test]
    fn test_add_body_attributes() {
        let body: AddBody = serde_json::from_str(
            r#"{"productId": 3, "quantity": 4, "attributes": {"shade": "nude"}}"#,
        )
        .unwrap();
        assert_eq!(body.quantity, 4);
        assert_eq!(body.attributes["shade"], "nude");
    }

    #[test]
    fn test_promo_body_accepts_both_names() {
        let a: PromoBody = serde_json::from_str(r#"{"code": "welcome10"}"#).unwrap();
        let b: PromoBody = serde_json::from_str(r#"{"promoCode": "welcome10"}"#).unwrap();
        assert_eq!(a.code, b.code);
    }
}
