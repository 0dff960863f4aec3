use rust_decimal::Decimal;

use crate::orders::OrderItem;

/// Totals of an order's frozen price snapshots
///
/// Promotions are not involved; an order's recorded total is the plain sum of
/// unit price times quantity.
pub struct PriceCalculator;

impl PriceCalculator {
    /// Calculate the amount of one order line
    ///
    /// # Arguments
    /// * `quantity` - Number of units ordered
    /// * `unit_price` - Price per unit at time of order
    pub fn calculate_subtotal(quantity: u32, unit_price: Decimal) -> Decimal {
        Decimal::from(quantity) * unit_price
    }

    /// Calculate the total of an order from its lines
    pub fn calculate_total(items: &[OrderItem]) -> Decimal {
        items
            .iter()
            .map(|item| Self::calculate_subtotal(item.quantity, item.unit_price))
            .sum()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn items_from(lines: &[(u32, u32)]) -> Vec<OrderItem> {
        lines
            .iter()
            .map(|&(price_cents, quantity)| OrderItem {
                item_id: "I".to_string(),
                item_name: "I".to_string(),
                unit_price: Decimal::from(price_cents) / Decimal::from(100),
                quantity,
            })
            .collect()
    }

    /// Total equals the sum of line subtotals
    #[test]
    fn prop_total_is_sum_of_subtotals() {
        proptest!(|(lines in prop::collection::vec((1u32..=100_000, 1u32..=100), 0..=20))| {
            let items = items_from(&lines);
            let expected: Decimal = items
                .iter()
                .map(|item| Decimal::from(item.quantity) * item.unit_price)
                .sum();
            prop_assert_eq!(PriceCalculator::calculate_total(&items), expected);
        });
    }

    /// Order of lines doesn't affect the total
    #[test]
    fn prop_total_is_commutative() {
        proptest!(|(lines in prop::collection::vec((1u32..=10_000, 1u32..=50), 2..=10))| {
            let items = items_from(&lines);
            let mut reversed = items.clone();
            reversed.reverse();
            prop_assert_eq!(
                PriceCalculator::calculate_total(&items),
                PriceCalculator::calculate_total(&reversed)
            );
        });
    }

    /// Totals are non-negative
    #[test]
    fn prop_totals_are_non_negative() {
        proptest!(|(lines in prop::collection::vec((0u32..=10_000, 1u32..=50), 0..=10))| {
            prop_assert!(PriceCalculator::calculate_total(&items_from(&lines)) >= Decimal::ZERO);
        });
    }
}
