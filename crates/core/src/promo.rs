//! Promo codes.
//!
//! Codes come from a fixed table compiled into the binary. A code either
//! takes a percentage off the subtotal or waives shipping; it never does both.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from promo code activation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromoError {
    /// Nothing was entered.
    #[error("enter a promo code")]
    Empty,
    /// The code is not in the table.
    #[error("unknown promo code: {0}")]
    Unknown(String),
}

/// What an active promo code does to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PromoEffect {
    /// Percentage of the subtotal, 0..=100.
    Percentage(u8),
    /// Shipping is zeroed regardless of subtotal.
    FreeShipping,
}

/// A validated promo code from the fixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromoCode {
    code: &'static str,
    effect: PromoEffect,
}

const PROMO_TABLE: &[PromoCode] = &[
    PromoCode::percentage("WELCOME10", 10),
    PromoCode::percentage("SUMMER20", 20),
    PromoCode::percentage("LUMIERE15", 15),
    PromoCode::percentage("COSMETIC30", 30),
    PromoCode {
        code: "FREESHIP",
        effect: PromoEffect::FreeShipping,
    },
];

impl PromoCode {
    const fn percentage(code: &'static str, percent: u8) -> Self {
        Self {
            code,
            effect: PromoEffect::Percentage(percent),
        }
    }

    /// Look up a code, ignoring surrounding whitespace and case.
    ///
    /// # Errors
    ///
    /// Returns `PromoError::Empty` for blank input and `PromoError::Unknown`
    /// for codes not in the table.
    pub fn lookup(input: &str) -> Result<Self, PromoError> {
        let normalized = input.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(PromoError::Empty);
        }

        PROMO_TABLE
            .iter()
            .find(|promo| promo.code == normalized)
            .copied()
            .ok_or(PromoError::Unknown(normalized))
    }

    /// The canonical upper-case code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }

    /// What the code does.
    #[must_use]
    pub const fn effect(&self) -> PromoEffect {
        self.effect
    }

    /// Whether this code waives shipping.
    #[must_use]
    pub const fn is_free_shipping(&self) -> bool {
        matches!(self.effect, PromoEffect::FreeShipping)
    }

    /// Message shown to the shopper after a successful activation.
    #[must_use]
    pub fn activation_message(&self) -> String {
        match self.effect {
            PromoEffect::Percentage(p) => format!("Promo code applied: {p}% off"),
            PromoEffect::FreeShipping => "Promo code applied: free shipping".to_owned(),
        }
    }
}
