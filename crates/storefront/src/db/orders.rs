//! Order repository.

use std::collections::BTreeMap;

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use lumiere_core::{CartSummary, Money, OrderId, ProductId, UserId};

use super::RepositoryError;
use crate::models::{Order, OrderItem, OrderSummary};

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.user_id, o.total_amount, o.discount, \
     o.shipping, o.grand_total, o.promo_code, o.status, o.shipping_address, \
     o.shipping_method, o.payment_method, o.notes, o.created_at, o.updated_at";

/// Current catalog state of a product in a cart.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogPrice {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub in_stock: bool,
}

/// A line to be written into `order_items`.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price: Money,
    pub attributes: BTreeMap<String, String>,
}

/// Everything needed to insert an order row.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: UserId,
    pub summary: CartSummary,
    pub promo_code: Option<&'a str>,
    pub shipping_address: &'a str,
    pub shipping_method: Option<&'a str>,
    pub payment_method: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Repository for order reads and writes.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first, each with the number of items ordered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let orders = sqlx::query_as::<_, OrderSummary>(&format!(
            "SELECT {ORDER_COLUMNS}, \
                    (SELECT COALESCE(SUM(oi.quantity), 0) FROM order_items oi WHERE oi.order_id = o.id) \
                        AS items_count \
             FROM orders o \
             WHERE o.user_id = $1 \
             ORDER BY o.created_at DESC, o.id DESC \
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(orders)
    }

    /// Get one of a user's orders. Orders of other users are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 AND o.user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(order)
    }

    /// Lines of an order with the product image, if the product still exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT oi.id, oi.order_id, oi.product_id, oi.product_name, oi.quantity, \
                    oi.price, oi.attributes, p.image_url \
             FROM order_items oi \
             LEFT JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = $1 \
             ORDER BY oi.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(items)
    }

    /// Current price and stock of the given products.
    ///
    /// Rows are share-locked so a concurrent reprice waits for the order to
    /// commit.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn catalog_prices(
        conn: &mut PgConnection,
        ids: &[ProductId],
    ) -> Result<Vec<CatalogPrice>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let prices = sqlx::query_as::<_, CatalogPrice>(
            "SELECT id, name, price, in_stock FROM products WHERE id = ANY($1) FOR SHARE",
        )
        .bind(raw)
        .fetch_all(&mut *conn)
        .await?;

        Ok(prices)
    }

    /// Insert an order and its lines. Returns the new order's ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    /// Returns `RepositoryError::Database` for other failures.
    pub async fn insert(
        conn: &mut PgConnection,
        order: &NewOrder<'_>,
        items: &[NewOrderItem],
    ) -> Result<OrderId, RepositoryError> {
        let id: OrderId = sqlx::query_scalar(
            "INSERT INTO orders \
                 (order_number, user_id, total_amount, discount, shipping, grand_total, \
                  promo_code, shipping_address, shipping_method, payment_method, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(order.order_number)
        .bind(order.user_id)
        .bind(order.summary.subtotal)
        .bind(order.summary.discount)
        .bind(order.summary.shipping)
        .bind(order.summary.total)
        .bind(order.promo_code)
        .bind(order.shipping_address)
        .bind(order.shipping_method)
        .bind(order.payment_method)
        .bind(order.notes)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "order number"))?;

        if !items.is_empty() {
            insert_items(id, items).build().execute(&mut *conn).await?;
        }

        Ok(id)
    }
}

fn insert_items(order_id: OrderId, items: &[NewOrderItem]) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(
        "INSERT INTO order_items (order_id, product_id, product_name, quantity, price, attributes) ",
    );
    builder.push_values(items, |mut row, item| {
        row.push_bind(order_id)
            .push_bind(item.product_id)
            .push_bind(item.product_name.clone())
            .push_bind(i32::try_from(item.quantity).unwrap_or(i32::MAX))
            .push_bind(item.price)
            .push_bind(Json(item.attributes.clone()));
    });
    builder
}
