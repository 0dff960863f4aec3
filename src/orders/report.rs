// Customer purchase report
// Per-user spending statistics derived from the order book, grouped by category and by item

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::Item;
use crate::orders::{Order, OrderError};
use crate::persistence::{format_display_time, format_money, join_record};

/// Category shown for items that are no longer in the catalog
pub const UNKNOWN_CATEGORY: &str = "Uncategorized";

/// Spending in one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatistics {
    pub category: String,
    pub total_amount: Decimal,
    /// Number of orders containing at least one item of this category
    pub purchase_frequency: u32,
}

/// Spending on one item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStatistics {
    pub item_id: String,
    pub item_name: String,
    pub category: String,
    pub total_amount: Decimal,
    pub purchase_quantity: u32,
    /// Number of orders containing this item
    pub purchase_frequency: u32,
}

/// Purchase statistics for one user
///
/// Amounts use the prices frozen in each order, before promotions. Both lists are
/// sorted by total amount, largest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerReport {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub order_count: usize,
    pub unit_count: u32,
    pub total_spent: Decimal,
    pub categories: Vec<CategoryStatistics>,
    pub items: Vec<ItemStatistics>,
}

impl CustomerReport {
    /// Aggregate `orders` for `user_id`
    ///
    /// # Arguments
    /// * `user_id` - Buyer the report is for
    /// * `orders` - That buyer's orders
    /// * `catalog` - Current items, used only to look up categories
    /// * `generated_at` - Report time
    ///
    /// # Returns
    /// `NoOrders` when the buyer has never ordered
    pub fn build(
        user_id: &str,
        orders: &[Order],
        catalog: &[Item],
        generated_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if orders.is_empty() {
            return Err(OrderError::NoOrders(user_id.to_string()));
        }

        let categories_by_item: HashMap<&str, &str> = catalog
            .iter()
            .map(|item| (item.item_id.as_str(), item.category.as_str()))
            .collect();
        let category_of = |item_id: &str| {
            categories_by_item
                .get(item_id)
                .copied()
                .unwrap_or(UNKNOWN_CATEGORY)
                .to_string()
        };

        let mut categories: BTreeMap<String, CategoryStatistics> = BTreeMap::new();
        let mut items: BTreeMap<String, ItemStatistics> = BTreeMap::new();

        for order in orders {
            let mut seen_items = HashSet::new();
            let mut seen_categories = HashSet::new();

            for line in &order.items {
                let category = category_of(&line.item_id);
                let amount = line.subtotal();

                let by_category = categories
                    .entry(category.clone())
                    .or_insert_with(|| CategoryStatistics {
                        category: category.clone(),
                        total_amount: Decimal::ZERO,
                        purchase_frequency: 0,
                    });
                by_category.total_amount += amount;
                if seen_categories.insert(category.clone()) {
                    by_category.purchase_frequency += 1;
                }

                let by_item = items
                    .entry(line.item_id.clone())
                    .or_insert_with(|| ItemStatistics {
                        item_id: line.item_id.clone(),
                        item_name: line.item_name.clone(),
                        category,
                        total_amount: Decimal::ZERO,
                        purchase_quantity: 0,
                        purchase_frequency: 0,
                    });
                by_item.total_amount += amount;
                by_item.purchase_quantity += line.quantity;
                if seen_items.insert(line.item_id.as_str()) {
                    by_item.purchase_frequency += 1;
                }
            }
        }

        // Stable sorts keep key order among equal amounts
        let mut categories: Vec<CategoryStatistics> = categories.into_values().collect();
        categories.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        let mut items: Vec<ItemStatistics> = items.into_values().collect();
        items.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));

        Ok(Self {
            user_id: user_id.to_string(),
            generated_at,
            order_count: orders.len(),
            unit_count: orders.iter().map(Order::unit_count).sum(),
            total_spent: orders.iter().map(|order| order.total_amount).sum(),
            categories,
            items,
        })
    }

    /// Suggested download name, `{user}_report_YYYYMMDD.csv`
    pub fn file_name(&self) -> String {
        let user: String = self
            .user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_report_{}.csv", user, self.generated_at.format("%Y%m%d"))
    }

    /// Render the report as CSV: a title block, then the category and item sections
    pub fn to_csv(&self) -> String {
        let mut lines = vec![
            "Customer purchase report".to_string(),
            join_record(["user", self.user_id.as_str()]),
            join_record(["generated", format_display_time(&self.generated_at).as_str()]),
            join_record(["orders".to_string(), self.order_count.to_string()]),
            join_record(["total spent".to_string(), format_money(self.total_spent)]),
            String::new(),
            "category,total amount,frequency".to_string(),
        ];

        lines.extend(self.categories.iter().map(|stats| {
            join_record([
                stats.category.clone(),
                format_money(stats.total_amount),
                stats.purchase_frequency.to_string(),
            ])
        }));

        lines.push(String::new());
        lines.push("item id,name,category,total amount,quantity,frequency".to_string());
        lines.extend(self.items.iter().map(|stats| {
            join_record([
                stats.item_id.clone(),
                stats.item_name.clone(),
                stats.category.clone(),
                format_money(stats.total_amount),
                stats.purchase_quantity.to_string(),
                stats.purchase_frequency.to_string(),
            ])
        }));

        let mut csv = lines.join("\n");
        csv.push('\n');
        csv
    }
}
