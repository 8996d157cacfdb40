//! Cart service.
//!
//! Every mutation runs in one transaction: lock and load the cart, apply a
//! single [`Cart`] operation, save it back, commit. The returned view is
//! priced from the cart that was just saved.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use lumiere_core::{
    Cart, CartLine, CartSummary, NewCartLine, ProductId, PromoCode, PromoError, Quantity, UserId,
};

use crate::db::{CartRepository, ProductRepository, RepositoryError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Product does not exist or is out of stock.
    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    /// Product is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// Promo code rejected.
    #[error(transparent)]
    Promo(#[from] PromoError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Cart as returned to clients: lines, active promo and fresh totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub promo: Option<PromoCode>,
    pub item_count: u32,
    pub summary: CartSummary,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.lines().to_vec(),
            promo: cart.promo().copied(),
            item_count: cart.item_count(),
            summary: cart.summary(),
        }
    }
}

/// Cart operations for one user at a time.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be read.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let cart = CartRepository::new(self.pool).load(user_id).await?;
        Ok(CartView::from(&cart))
    }

    /// Add a product. Requests below one item change nothing.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductUnavailable` if the product is missing or out of stock.
    #[instrument(skip(self, attributes), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add(
        &self,
        user_id: UserId,
        product_id: ProductId,
        requested: i64,
        attributes: BTreeMap<String, String>,
    ) -> Result<CartView, CartError> {
        let product = ProductRepository::new(self.pool)
            .get(product_id)
            .await?
            .filter(|p| p.in_stock)
            .ok_or(CartError::ProductUnavailable(product_id))?;

        let Some(quantity) = Quantity::clamped(requested) else {
            return self.view(user_id).await;
        };

        let line = NewCartLine {
            product_id,
            name: product.name,
            unit_price: product.price,
            original_price: product.original_price,
            attributes,
        };

        self.mutate(user_id, |cart| {
            cart.add(line, quantity);
            Ok(())
        })
        .await
        .map(|((), view)| view)
    }

    /// Set a line's quantity; zero or less removes it, above 99 is clamped.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if the product is not in the cart.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        requested: i64,
    ) -> Result<CartView, CartError> {
        self.mutate(user_id, |cart| {
            if cart.set_quantity(product_id, requested) {
                Ok(())
            } else {
                Err(CartError::NotInCart(product_id))
            }
        })
        .await
        .map(|((), view)| view)
    }

    /// Remove a product. Removing an absent product is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be saved.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<CartView, CartError> {
        self.mutate(user_id, |cart| {
            cart.remove(product_id);
            Ok(())
        })
        .await
        .map(|((), view)| view)
    }

    /// Empty the cart and drop its promo code.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be saved.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, CartError> {
        self.mutate(user_id, |cart| {
            cart.clear();
            Ok(())
        })
        .await
        .map(|((), view)| view)
    }

    /// Activate a promo code. On rejection the cart is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Promo` for blank or unknown codes.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn apply_promo(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<(PromoCode, CartView), CartError> {
        // Reject before opening a transaction
        let promo = PromoCode::lookup(code)?;
        self.mutate(user_id, |cart| Ok(cart.apply_promo(promo.code())?))
            .await
    }

    /// Deactivate the promo code.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the cart cannot be saved.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_promo(&self, user_id: UserId) -> Result<CartView, CartError> {
        self.mutate(user_id, |cart| {
            cart.remove_promo();
            Ok(())
        })
        .await
        .map(|((), view)| view)
    }

    async fn mutate<T, F>(&self, user_id: UserId, op: F) -> Result<(T, CartView), CartError>
    where
        F: FnOnce(&mut Cart) -> Result<T, CartError>,
    {
        let mut tx = self.pool.begin().await?;

        let mut cart = CartRepository::load_for_update(&mut tx, user_id).await?;
        // Dropping `tx` on error rolls back and releases the locks
        let out = op(&mut cart)?;
        CartRepository::save(&mut tx, user_id, &cart).await?;

        tx.commit().await?;
        Ok((out, CartView::from(&cart)))
    }
}
