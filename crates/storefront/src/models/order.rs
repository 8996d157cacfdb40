//! Order domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;

use lumiere_core::{Money, OrderId, OrderStatus, ProductId, UserId};

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    /// Sum of line totals at placement time.
    pub total_amount: Money,
    pub discount: Money,
    pub shipping: Money,
    /// What the customer pays: `total_amount - discount + shipping`.
    pub grand_total: Money,
    pub promo_code: Option<String>,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub shipping_method: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order row in history listings, with its line count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub items_count: i64,
}

/// One locked line of an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i32,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: i32,
    /// Unit price locked at placement time.
    pub price: Money,
    pub attributes: Json<BTreeMap<String, String>>,
    pub image_url: Option<String>,
}

impl OrderItem {
    /// `price x quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * u32::try_from(self.quantity).unwrap_or(0)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
