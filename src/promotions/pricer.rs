// Promotion pricer
// Applies item discounts first, then stacks every qualifying full reduction against the
// discounted subtotal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::BasketLine;
use crate::persistence::format_money;
use crate::promotions::PromotionSnapshot;

/// Discount received by one basket line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDiscount {
    pub item_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedKind {
    Discount,
    FullReduction,
}

/// One entry of the applied-promotions list, in application order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedPromotion {
    pub promotion_id: String,
    pub kind: AppliedKind,
    pub description: String,
}

/// Outcome of pricing a basket; never persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingResult {
    pub original_total: Decimal,
    pub after_discount_total: Decimal,
    pub final_total: Decimal,
    pub total_savings: Decimal,
    pub total_reduction: Decimal,
    pub item_discounts: Vec<ItemDiscount>,
    pub applied_promotions: Vec<AppliedPromotion>,
}

impl Default for PricingResult {
    fn default() -> Self {
        Self {
            original_total: Decimal::ZERO,
            after_discount_total: Decimal::ZERO,
            final_total: Decimal::ZERO,
            total_savings: Decimal::ZERO,
            total_reduction: Decimal::ZERO,
            item_discounts: Vec::new(),
            applied_promotions: Vec::new(),
        }
    }
}

impl PricingResult {
    /// Applied promotion descriptions, discounts first
    pub fn descriptions(&self) -> Vec<&str> {
        self.applied_promotions
            .iter()
            .map(|applied| applied.description.as_str())
            .collect()
    }

    pub fn discount_tags(&self) -> Vec<&str> {
        self.tags_of(AppliedKind::Discount)
    }

    pub fn reduction_tags(&self) -> Vec<&str> {
        self.tags_of(AppliedKind::FullReduction)
    }

    /// Savings from item discounts alone
    pub fn discount_savings(&self) -> Decimal {
        self.original_total - self.after_discount_total
    }

    /// Checkout preview text, money rounded to two decimals
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Original total: {}", format_money(self.original_total))];

        for discount in &self.item_discounts {
            lines.push(format!(
                "  {} discount: -{}",
                discount.item_name,
                format_money(discount.amount)
            ));
        }
        if !self.item_discounts.is_empty() {
            lines.push(format!(
                "After discounts: {}",
                format_money(self.after_discount_total)
            ));
        }
        for tag in self.reduction_tags() {
            lines.push(format!("  {}", tag));
        }
        if self.total_reduction > Decimal::ZERO {
            lines.push(format!("Reductions: -{}", format_money(self.total_reduction)));
        }

        lines.push(format!("Final total: {}", format_money(self.final_total)));
        lines.push(format!("You save: {}", format_money(self.total_savings)));
        lines
    }

    fn tags_of(&self, kind: AppliedKind) -> Vec<&str> {
        self.applied_promotions
            .iter()
            .filter(|applied| applied.kind == kind)
            .map(|applied| applied.description.as_str())
            .collect()
    }
}

/// Stateless pricing algorithm
pub struct PromotionPricer;

impl PromotionPricer {
    /// Price a basket against a promotion snapshot at `now`
    ///
    /// # Arguments
    /// * `basket` - Lines in display order; that order fixes the order of item discounts
    /// * `promotions` - Snapshot taken from the promotion catalog
    /// * `now` - Instant used for every validity check
    ///
    /// # Returns
    /// The full breakdown; an empty basket gives all zeros
    pub fn price(
        basket: &[BasketLine],
        promotions: &PromotionSnapshot,
        now: DateTime<Utc>,
    ) -> PricingResult {
        let mut result = PricingResult::default();

        for line in basket {
            let quantity = Decimal::from(line.quantity);
            let line_original = line.item.price * quantity;
            result.original_total += line_original;

            let line_discounted = match promotions.active_discount_for(&line.item.item_id, now) {
                Some(discount) => {
                    let discounted = discount.price_after_discount(line.item.price) * quantity;
                    result.item_discounts.push(ItemDiscount {
                        item_name: line.item.item_name.clone(),
                        amount: line_original - discounted,
                    });
                    result.applied_promotions.push(AppliedPromotion {
                        promotion_id: discount.id.clone(),
                        kind: AppliedKind::Discount,
                        description: format!("{} {}", line.item.item_name, discount.display_tag()),
                    });
                    discounted
                }
                None => line_original,
            };
            result.after_discount_total += line_discounted;
        }

        // Every reduction is tested against the same discounted subtotal
        for reduction in promotions.active_full_reductions(now) {
            let amount = reduction.reduction_for(result.after_discount_total);
            if amount > Decimal::ZERO {
                result.total_reduction += amount;
                result.applied_promotions.push(AppliedPromotion {
                    promotion_id: reduction.id.clone(),
                    kind: AppliedKind::FullReduction,
                    description: reduction.display_tag(),
                });
            }
        }

        result.final_total = result.after_discount_total - result.total_reduction;
        result.total_savings = result.original_total - result.final_total;

        tracing::debug!(
            "Priced {} lines: original {} final {}",
            basket.len(),
            result.original_total,
            result.final_total
        );
        result
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::models::Item;
    use crate::promotions::{DiscountTarget, Promotion};
    use chrono::Duration;
    use proptest::prelude::*;

    fn basket_from(lines: &[(u32, u32)]) -> Vec<BasketLine> {
        lines
            .iter()
            .enumerate()
            .map(|(i, &(price_cents, quantity))| {
                BasketLine::new(
                    Item {
                        item_id: format!("I{}", i),
                        item_name: format!("Item {}", i),
                        category: String::new(),
                        price: Decimal::new(price_cents as i64, 2),
                        description: String::new(),
                        stock: 1000,
                    },
                    quantity,
                )
            })
            .collect()
    }

    /// Without promotions the final total is the original total
    #[test]
    fn prop_no_promotions_means_no_savings() {
        proptest!(|(lines in prop::collection::vec((1u32..=100_000, 1u32..=20), 0..=10))| {
            let result = PromotionPricer::price(&basket_from(&lines), &PromotionSnapshot::default(), Utc::now());
            prop_assert_eq!(result.final_total, result.original_total);
            prop_assert!(result.applied_promotions.is_empty());
        });
    }

    /// Totals always satisfy the savings identity and never go negative
    #[test]
    fn prop_totals_are_consistent() {
        proptest!(|(
            lines in prop::collection::vec((1u32..=100_000, 1u32..=20), 0..=10),
            rate in 1i64..=99,
            threshold_cents in 1u32..=500_000,
            reduction_pct in 1u32..=99
        )| {
            let now = Utc::now();
            let threshold = Decimal::new(threshold_cents as i64, 2);
            let reduction = threshold * Decimal::new(reduction_pct as i64, 2);
            let snapshot = PromotionSnapshot::new(vec![
                Promotion::discount("PROMO001", "d", DiscountTarget::AllItems, Decimal::new(rate, 2),
                    now - Duration::hours(1), now + Duration::hours(1)),
                Promotion::full_reduction("PROMO002", "r", threshold, reduction,
                    now - Duration::hours(1), now + Duration::hours(1)),
            ]);

            let result = PromotionPricer::price(&basket_from(&lines), &snapshot, now);

            prop_assert_eq!(result.total_savings, result.original_total - result.final_total);
            prop_assert_eq!(result.final_total, result.after_discount_total - result.total_reduction);
            prop_assert!(result.final_total >= Decimal::ZERO);
            prop_assert!(result.after_discount_total <= result.original_total);
            let discount_sum: Decimal = result.item_discounts.iter().map(|d| d.amount).sum();
            prop_assert_eq!(discount_sum, result.discount_savings());
        });
    }
}
