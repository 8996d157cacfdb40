//! Shopping cart lines and their mutations.
//!
//! A [`Cart`] is the single authoritative cart model. The storefront loads it
//! from the database, applies exactly one mutation, saves it back, and then
//! asks for a fresh [`CartSummary`]. Totals are never cached on the cart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pricing::{self, CartSummary};
use crate::promo::{PromoCode, PromoError};
use crate::types::{Money, ProductId};

/// A line quantity, always within `1..=99`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u8);

/// Returned when a requested quantity is below one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("quantity must be at least 1 (got {0})")]
pub struct QuantityTooSmall(pub i64);

impl Quantity {
    /// Largest quantity a single line may hold.
    pub const MAX: Self = Self(99);
    /// One item.
    pub const ONE: Self = Self(1);

    /// Clamp a requested quantity to at most 99.
    ///
    /// Returns `None` for zero or negative requests, which callers treat as
    /// "remove the line".
    #[must_use]
    pub fn clamped(requested: i64) -> Option<Self> {
        if requested < 1 {
            return None;
        }
        let capped = requested.min(i64::from(Self::MAX.0));
        u8::try_from(capped).ok().map(Self)
    }

    /// The quantity as a plain integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0 as u32
    }

    /// Add `other`, saturating at [`Quantity::MAX`].
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0).min(Self::MAX.0))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityTooSmall;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::clamped(value).ok_or(QuantityTooSmall(value))
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl From<Quantity> for i32 {
    fn from(quantity: Quantity) -> Self {
        i32::from(quantity.0)
    }
}

/// Product data captured when an item is put into the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub original_price: Option<Money>,
    pub attributes: BTreeMap<String, String>,
}

/// One product entry in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Money>,
    pub quantity: Quantity,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl CartLine {
    /// `unit_price x quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity.get()
    }
}

/// A shopper's cart: ordered lines plus at most one active promo code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
    promo: Option<PromoCode>,
}

impl Cart {
    /// An empty cart with no promo.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            promo: None,
        }
    }

    /// Rebuild a cart from persisted state.
    ///
    /// Lines for the same product are merged so a cart never holds duplicates.
    #[must_use]
    pub fn from_parts(lines: Vec<CartLine>, promo: Option<PromoCode>) -> Self {
        let mut cart = Self { lines: Vec::with_capacity(lines.len()), promo };
        for line in lines {
            match cart.line_mut(line.product_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
                None => cart.lines.push(line),
            }
        }
        cart
    }

    /// Current lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The active promo code, if any.
    #[must_use]
    pub const fn promo(&self) -> Option<&PromoCode> {
        self.promo.as_ref()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of items across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity.get()).sum()
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.product_id == product_id)
    }

    /// Add `quantity` of a product.
    ///
    /// An existing line for the same product has its quantity incremented
    /// (capped at 99); its captured price and attributes are kept.
    pub fn add(&mut self, product: NewCartLine, quantity: Quantity) {
        if let Some(existing) = self.line_mut(product.product_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return;
        }

        self.lines.push(CartLine {
            product_id: product.product_id,
            name: product.name,
            unit_price: product.unit_price,
            original_price: product.original_price,
            quantity,
            attributes: product.attributes,
        });
    }

    /// Set a line's quantity.
    ///
    /// Requests above 99 are clamped; zero or negative removes the line.
    /// Returns `false` if the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, requested: i64) -> bool {
        match Quantity::clamped(requested) {
            Some(quantity) => match self.line_mut(product_id) {
                Some(line) => {
                    line.quantity = quantity;
                    true
                }
                None => false,
            },
            None => self.remove(product_id),
        }
    }

    /// Remove a product's line. Returns `false` if it was not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    /// Empty the cart and deactivate any promo code.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.promo = None;
    }

    /// Activate a promo code, replacing any active one.
    ///
    /// # Errors
    ///
    /// Returns a `PromoError` for blank or unknown codes; the cart, including
    /// a previously active code, is left untouched.
    pub fn apply_promo(&mut self, code: &str) -> Result<PromoCode, PromoError> {
        let promo = PromoCode::lookup(code)?;
        self.promo = Some(promo);
        Ok(promo)
    }

    /// Deactivate the promo code.
    pub fn remove_promo(&mut self) {
        self.promo = None;
    }

    /// Price the cart as it currently stands.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        pricing::summarize(&self.lines, self.promo.as_ref())
    }
}
