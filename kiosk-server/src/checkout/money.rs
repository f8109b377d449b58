//! Money helpers for order totals
//!
//! Wire types carry `f64`; all arithmetic goes through `Decimal` and is
//! rounded to 2 decimal places on the way out, so repeated conversions can
//! never accumulate float drift into a shopper-visible total.

use rust_decimal::prelude::*;
use shared::cart::CartLine;

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or(0.0)
}

/// Computed order totals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

/// Calculate subtotal, tax and total for a set of cart lines
///
/// Tax is `subtotal × rate` rounded to 2 dp before being added, so the
/// stored `total` always equals `subtotal + tax` exactly.
pub fn calculate_totals(lines: &[CartLine], tax_rate_percent: f64) -> OrderTotals {
    let subtotal: Decimal = lines
        .iter()
        .map(|line| to_decimal(line.unit_price) * Decimal::from(line.quantity))
        .sum();

    let tax = (subtotal * to_decimal(tax_rate_percent) / Decimal::ONE_HUNDRED).round_dp(2);
    let total = subtotal + tax;

    OrderTotals {
        subtotal: to_f64(subtotal),
        tax: to_f64(tax),
        total: to_f64(total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: f64, quantity: u32) -> CartLine {
        CartLine {
            product_id: "p1".into(),
            name: "Cola".into(),
            unit_price: price,
            quantity,
            image: None,
        }
    }

    #[test]
    fn totals_with_eight_percent_tax() {
        let totals = calculate_totals(&[line(10.0, 3)], 8.0);
        assert_eq!(totals.subtotal, 30.0);
        assert_eq!(totals.tax, 2.40);
        assert_eq!(totals.total, 32.40);
    }

    #[test]
    fn tax_rounds_to_two_decimals() {
        // 3 × 1.99 = 5.97, 8% = 0.4776 → 0.48
        let totals = calculate_totals(&[line(1.99, 3)], 8.0);
        assert_eq!(totals.subtotal, 5.97);
        assert_eq!(totals.tax, 0.48);
        assert_eq!(totals.total, 6.45);
    }

    #[test]
    fn empty_cart_is_zero() {
        let totals = calculate_totals(&[], 8.0);
        assert_eq!(totals.total, 0.0);
    }
}
