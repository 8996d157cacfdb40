//! Checkout and order history.

use std::collections::HashMap;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use lumiere_core::{CartLine, CartSummary, Money, OrderId, ProductId, PromoCode, PromoError, UserId};

use crate::db::orders::{CatalogPrice, NewOrder, NewOrderItem};
use crate::db::{CartRepository, OrderRepository, RepositoryError};
use crate::models::{OrderDetail, OrderSummary};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("shipping address is required")]
    MissingShippingAddress,

    /// A cart line refers to a product that was deleted or sold out since it was added.
    #[error("product {0} is no longer available")]
    ProductUnavailable(ProductId),

    #[error(transparent)]
    Promo(#[from] PromoError),

    /// The order amount does not fit the order columns.
    #[error("order total {0} exceeds the maximum")]
    TotalTooLarge(Money),

    #[error("order not found")]
    NotFound,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Checkout details supplied by the shopper.
#[derive(Debug, Clone, Default)]
pub struct Checkout<'a> {
    pub shipping_address: &'a str,
    pub shipping_method: Option<&'a str>,
    pub payment_method: Option<&'a str>,
    pub notes: Option<&'a str>,
    /// Replaces the cart's active promo when present.
    pub promo_code: Option<&'a str>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub order_number: String,
    pub promo_code: Option<&'static str>,
    #[serde(flatten)]
    pub summary: CartSummary,
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order.
    ///
    /// Prices are re-read from the catalog inside the transaction, so the
    /// order locks in what the products cost at commit time. The cart and its
    /// promo are cleared in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` if the cart has no lines.
    /// Returns `OrderError::MissingShippingAddress` if the address is blank.
    /// Returns `OrderError::ProductUnavailable` if a line can no longer be bought.
    /// Returns `OrderError::Promo` if an explicit promo code is unknown.
    #[instrument(skip(self, checkout), fields(user_id = %user_id))]
    pub async fn place(
        &self,
        user_id: UserId,
        checkout: &Checkout<'_>,
    ) -> Result<PlacedOrder, OrderError> {
        let shipping_address = checkout.shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(OrderError::MissingShippingAddress);
        }
        let explicit_promo = checkout
            .promo_code
            .filter(|c| !c.trim().is_empty())
            .map(PromoCode::lookup)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let mut cart = CartRepository::load_for_update(&mut tx, user_id).await?;
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.lines().iter().map(|l| l.product_id).collect();
        let catalog = OrderRepository::catalog_prices(&mut tx, &ids).await?;
        let items = lock_prices(cart.lines(), &catalog)?;

        let promo = explicit_promo.or_else(|| cart.promo().copied());
        let subtotal = items.iter().map(|i| i.price * i.quantity).sum();
        let summary = CartSummary::from_subtotal(subtotal, promo.as_ref());
        check_amounts(&summary)?;

        let order_number = generate_order_number();
        let order = NewOrder {
            order_number: &order_number,
            user_id,
            summary,
            promo_code: promo.as_ref().map(PromoCode::code),
            shipping_address,
            shipping_method: trimmed(checkout.shipping_method),
            payment_method: trimmed(checkout.payment_method),
            notes: trimmed(checkout.notes),
        };
        let id = OrderRepository::insert(&mut tx, &order, &items).await?;

        cart.clear();
        CartRepository::save(&mut tx, user_id, &cart).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %id,
            order_number = %order_number,
            total = %summary.total,
            "Order placed"
        );

        Ok(PlacedOrder {
            id,
            order_number,
            promo_code: promo.map(|p| p.code()),
            summary,
        })
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(OrderRepository::new(self.pool)
            .list_for_user(user_id, limit)
            .await?)
    }

    /// One of the user's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the order does not exist or belongs to someone else.
    pub async fn detail(&self, user_id: UserId, id: OrderId) -> Result<OrderDetail, OrderError> {
        let repo = OrderRepository::new(self.pool);
        let order = repo
            .get_for_user(user_id, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = repo.items(order.id).await?;

        Ok(OrderDetail { order, items })
    }
}

/// Pair each cart line with the current catalog price.
fn lock_prices(
    lines: &[CartLine],
    catalog: &[CatalogPrice],
) -> Result<Vec<NewOrderItem>, OrderError> {
    let by_id: HashMap<ProductId, &CatalogPrice> = catalog.iter().map(|p| (p.id, p)).collect();

    lines
        .iter()
        .map(|line| {
            let product = by_id
                .get(&line.product_id)
                .filter(|p| p.in_stock)
                .ok_or(OrderError::ProductUnavailable(line.product_id))?;

            Ok(NewOrderItem {
                product_id: line.product_id,
                product_name: product.name.clone(),
                quantity: line.quantity.get(),
                price: product.price,
                attributes: line.attributes.clone(),
            })
        })
        .collect()
}

fn check_amounts(summary: &CartSummary) -> Result<(), OrderError> {
    let largest = summary.subtotal.max(summary.total);
    if largest > Money::MAX_ORDER_AMOUNT {
        return Err(OrderError::TotalTooLarge(largest));
    }
    Ok(())
}

/// `ORD-<unix millis>-<0..999>`.
fn generate_order_number() -> String {
    format!(
        "ORD-{}-{}",
        Utc::now().timestamp_millis(),
        rand::rng().random_range(0..1000_u32)
    )
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use lumiere_core::Quantity;

    use super::*;

    fn line(id: i32, price: i64, quantity: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Old name {id}"),
            unit_price: Money::from_units(price),
            original_price: None,
            quantity: Quantity::clamped(quantity).unwrap(),
            attributes: BTreeMap::from([("volume".to_owned(), "50ml".to_owned())]),
        }
    }

    fn catalog(id: i32, price: i64, in_stock: bool) -> CatalogPrice {
        CatalogPrice {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::from_units(price),
            in_stock,
        }
    }

    #[test]
    fn test_large_order_within_column_limits() {
        // Three units at fifty million
        let subtotal = Money::from_units(50_000_000) * 3;
        assert!(check_amounts(&CartSummary::from_subtotal(subtotal, None)).is_ok());

        let worst_line = Money::MAX_PRICE * u32::from(Quantity::MAX);
        assert!(check_amounts(&CartSummary::from_subtotal(worst_line, None)).is_ok());
    }

    #[test]
    fn test_order_above_column_limit_rejected() {
        let subtotal = Money::MAX_PRICE * 99 * 200;
        let err = check_amounts(&CartSummary::from_subtotal(subtotal, None)).unwrap_err();
        assert!(matches!(err, OrderError::TotalTooLarge(amount) if amount == subtotal));
    }

    #[test]
    fn test_lock_prices_uses_catalog_price() {
        let items = lock_prices(&[line(1, 900, 2)], &[catalog(1, 1000, true)]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, Money::from_units(1000));
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].product_name, "Product 1");
        assert_eq!(items[0].attributes["volume"], "50ml");
    }

    #[test]
    fn test_lock_prices_rejects_missing_product() {
        let result = lock_prices(&[line(1, 900, 1), line(2, 500, 1)], &[catalog(1, 900, true)]);
        assert!(matches!(result, Err(OrderError::ProductUnavailable(id)) if id == ProductId::new(2)));
    }

    #[test]
    fn test_lock_prices_rejects_sold_out_product() {
        let result = lock_prices(&[line(1, 900, 1)], &[catalog(1, 900, false)]);
        assert!(matches!(result, Err(OrderError::ProductUnavailable(_))));
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().unwrap() > 1_600_000_000_000);
        assert!(parts[2].parse::<u32>().unwrap() < 1000);
    }

    #[test]
    fn test_empty_cart_message() {
        assert_eq!(OrderError::EmptyCart.to_string(), "Cart is empty");
    }

    #[test]
    fn test_placed_order_flattens_summary() {
        let placed = PlacedOrder {
            id: OrderId::new(7),
            order_number: "ORD-1-2".to_owned(),
            promo_code: Some("WELCOME10"),
            summary: CartSummary::from_subtotal(
                Money::from_units(4000),
                PromoCode::lookup("WELCOME10").ok().as_ref(),
            ),
        };
        let json = serde_json::to_value(&placed).unwrap();
        assert_eq!(json["order_number"], "ORD-1-2");
        assert_eq!(json["total"], "3600");
        assert_eq!(json["shipping"], "0");
    }
}
