//! Checkout arithmetic.
//!
//! Totals are computed once when an order is placed and stored on the order;
//! nothing downstream recomputes them from current product prices.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::config::PricingConfig;
use crate::models::order::Fulfillment;

/// One priced cart line.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl PricedLine {
    pub fn line_total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Round to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The price a customer pays: the sale price when it undercuts the list price.
pub fn effective_price(price: Decimal, sale_price: Option<Decimal>) -> Decimal {
    match sale_price {
        Some(sale) if sale < price && sale >= Decimal::ZERO => sale,
        _ => price,
    }
}

pub fn compute_totals(
    lines: &[PricedLine],
    fulfillment: Fulfillment,
    pricing: &PricingConfig,
) -> OrderTotals {
    let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
    let tax = round_money(subtotal * pricing.tax_rate);
    let shipping = match fulfillment {
        Fulfillment::Pickup => Decimal::ZERO,
        Fulfillment::Delivery if subtotal >= pricing.free_delivery_threshold => Decimal::ZERO,
        Fulfillment::Delivery => round_money(pricing.delivery_fee),
    };

    OrderTotals {
        subtotal,
        tax,
        shipping,
        total: subtotal + tax + shipping,
    }
}

/// Convert a currency amount to the provider's minor units (cents).
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let cents = round_money(amount) * Decimal::ONE_HUNDRED;
    i64::try_from(cents.trunc()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn pricing() -> PricingConfig {
        PricingConfig {
            tax_rate: dec("0.0825"),
            delivery_fee: dec("5.99"),
            free_delivery_threshold: dec("50.00"),
            currency: "usd".into(),
        }
    }

    #[test]
    fn test_pickup_has_no_shipping() {
        let lines = vec![
            PricedLine { unit_price: dec("12.49"), quantity: 2 },
            PricedLine { unit_price: dec("3.00"), quantity: 1 },
        ];
        let totals = compute_totals(&lines, Fulfillment::Pickup, &pricing());
        assert_eq!(totals.subtotal, dec("27.98"));
        // 27.98 * 0.0825 = 2.30835 -> 2.31
        assert_eq!(totals.tax, dec("2.31"));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec("30.29"));
    }

    #[test]
    fn test_delivery_fee_and_free_threshold() {
        let small = vec![PricedLine { unit_price: dec("10.00"), quantity: 1 }];
        let totals = compute_totals(&small, Fulfillment::Delivery, &pricing());
        assert_eq!(totals.shipping, dec("5.99"));

        let large = vec![PricedLine { unit_price: dec("25.00"), quantity: 2 }];
        let totals = compute_totals(&large, Fulfillment::Delivery, &pricing());
        assert_eq!(totals.shipping, Decimal::ZERO);
    }

    #[test]
    fn test_effective_price() {
        assert_eq!(effective_price(dec("10.00"), None), dec("10.00"));
        assert_eq!(effective_price(dec("10.00"), Some(dec("7.50"))), dec("7.50"));
        // A "sale" above list price is ignored
        assert_eq!(effective_price(dec("10.00"), Some(dec("12.00"))), dec("10.00"));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(dec("30.29")), Some(3029));
        assert_eq!(to_minor_units(dec("0.005")), Some(1));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
    }
}
