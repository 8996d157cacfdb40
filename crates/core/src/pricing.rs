//! Cart pricing: subtotal, promo discount, shipping and total.
//!
//! Everything here is a pure function of the lines and the active promo, so
//! the same numbers come out whether a cart is being displayed or an order is
//! being placed.

use serde::Serialize;

use crate::cart::CartLine;
use crate::promo::{PromoCode, PromoEffect};
use crate::types::Money;

/// Subtotals strictly above this ship for free.
pub const FREE_SHIPPING_THRESHOLD: i64 = 3000;

/// Shipping charged at or below the threshold.
pub const FLAT_SHIPPING: i64 = 300;

/// Computed totals for a cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping: Money,
    pub total: Money,
}

impl CartSummary {
    /// Price an already-summed subtotal.
    ///
    /// An empty cart (zero subtotal) is all zeroes: no shipping is charged
    /// when there is nothing to ship.
    #[must_use]
    pub fn from_subtotal(subtotal: Money, promo: Option<&PromoCode>) -> Self {
        if !subtotal.is_positive() {
            return Self::default();
        }

        let discount = match promo.map(PromoCode::effect) {
            Some(PromoEffect::Percentage(percent)) => subtotal.percent(percent),
            Some(PromoEffect::FreeShipping) | None => Money::ZERO,
        };

        let free_shipping = promo.is_some_and(PromoCode::is_free_shipping)
            || subtotal > Money::from_units(FREE_SHIPPING_THRESHOLD);
        let shipping = if free_shipping {
            Money::ZERO
        } else {
            Money::from_units(FLAT_SHIPPING)
        };

        Self {
            subtotal,
            discount,
            shipping,
            total: subtotal - discount + shipping,
        }
    }
}

/// Price a set of cart lines.
#[must_use]
pub fn summarize<'a, I>(lines: I, promo: Option<&PromoCode>) -> CartSummary
where
    I: IntoIterator<Item = &'a CartLine>,
{
    let subtotal = lines.into_iter().map(CartLine::line_total).sum();
    CartSummary::from_subtotal(subtotal, promo)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::cart::Quantity;
    use crate::types::ProductId;

    fn line(id: i32, price: i64, quantity: i64) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Item {id}"),
            unit_price: Money::from_units(price),
            original_price: None,
            quantity: Quantity::clamped(quantity).unwrap(),
            attributes: BTreeMap::new(),
        }
    }

    fn promo(code: &str) -> PromoCode {
        PromoCode::lookup(code).unwrap()
    }

    #[test]
    fn test_small_cart_pays_flat_shipping() {
        let summary = summarize(&[line(1, 1000, 2)], None);
        assert_eq!(summary.subtotal, Money::from_units(2000));
        assert_eq!(summary.discount, Money::ZERO);
        assert_eq!(summary.shipping, Money::from_units(300));
        assert_eq!(summary.total, Money::from_units(2300));
    }

    #[test]
    fn test_percentage_promo_over_threshold() {
        let summary = summarize(&[line(1, 2000, 2)], Some(&promo("WELCOME10")));
        assert_eq!(summary.subtotal, Money::from_units(4000));
        assert_eq!(summary.discount, Money::from_units(400));
        assert_eq!(summary.shipping, Money::ZERO);
        assert_eq!(summary.total, Money::from_units(3600));
    }

    #[test]
    fn test_threshold_is_strict() {
        let at = summarize(&[line(1, 1500, 2)], None);
        assert_eq!(at.shipping, Money::from_units(300));

        let above = summarize(&[line(1, 1501, 2)], None);
        assert_eq!(above.shipping, Money::ZERO);
    }

    #[test]
    fn test_free_shipping_promo() {
        let summary = summarize(&[line(1, 500, 1)], Some(&promo("FREESHIP")));
        assert_eq!(summary.discount, Money::ZERO);
        assert_eq!(summary.shipping, Money::ZERO);
        assert_eq!(summary.total, Money::from_units(500));
    }

    #[test]
    fn test_threshold_uses_pre_discount_subtotal() {
        // 3100 - 30% = 2170, still ships free because 3100 > 3000
        let summary = summarize(&[line(1, 3100, 1)], Some(&promo("COSMETIC30")));
        assert_eq!(summary.discount, Money::from_units(930));
        assert_eq!(summary.shipping, Money::ZERO);
        assert_eq!(summary.total, Money::from_units(2170));
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        assert_eq!(summarize(&[], None), CartSummary::default());
        assert_eq!(summarize(&[], Some(&promo("SUMMER20"))), CartSummary::default());
    }

    #[test]
    fn test_total_identity_holds() {
        let carts = [
            vec![line(1, 199, 3)],
            vec![line(1, 1250, 1), line(2, 875, 2)],
            vec![line(1, 4999, 7), line(2, 1, 99)],
        ];
        let promos = [None, Some(promo("LUMIERE15")), Some(promo("FREESHIP"))];

        for lines in &carts {
            for promo in &promos {
                let s = summarize(lines, promo.as_ref());
                let expected_subtotal: Money = lines.iter().map(CartLine::line_total).sum();
                assert_eq!(s.subtotal, expected_subtotal);
                assert_eq!(s.total, s.subtotal - s.discount + s.shipping);
                assert!(s.discount <= s.subtotal);
                assert!(s.shipping == Money::ZERO || s.shipping == Money::from_units(FLAT_SHIPPING));
            }
        }
    }

    #[test]
    fn test_summary_serializes_flat_fields() {
        let summary = summarize(&[line(1, 1000, 2)], None);
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["subtotal"], "2000");
        assert_eq!(json["shipping"], "300");
        assert_eq!(json["total"], "2300");
    }
}
