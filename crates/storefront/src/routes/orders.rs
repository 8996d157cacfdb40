//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumiere_core::OrderId;

use super::parse_id;
use crate::error::{JsonBody, Result};
use crate::middleware::RequireUser;
use crate::models::{OrderDetail, OrderSummary};
use crate::services::orders::{Checkout, OrderService, PlacedOrder};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderBody {
    #[serde(default)]
    pub shipping_address: String,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub order: PlacedOrder,
}

#[derive(Debug, Serialize)]
pub struct OrderList {
    pub orders: Vec<OrderSummary>,
}

/// Check out the current cart.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    JsonBody(body): JsonBody<PlaceOrderBody>,
) -> Result<Json<OrderPlaced>> {
    let order = OrderService::new(state.pool())
        .place(
            user.id,
            &Checkout {
                shipping_address: &body.shipping_address,
                shipping_method: body.shipping_method.as_deref(),
                payment_method: body.payment_method.as_deref(),
                notes: body.notes.as_deref(),
                promo_code: body.promo_code.as_deref(),
            },
        )
        .await?;

    Ok(Json(OrderPlaced {
        success: true,
        message: "Order created successfully",
        order,
    }))
}

/// The user's order history.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<OrderList>> {
    let orders = OrderService::new(state.pool()).history(user.id, None).await?;
    Ok(Json(OrderList { orders }))
}

/// One order with its lines.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<String>,
) -> Result<Json<OrderDetail>> {
    let id: OrderId = parse_id(&id, "order")?;
    let detail = OrderService::new(state.pool()).detail(user.id, id).await?;
    Ok(Json(detail))
}
