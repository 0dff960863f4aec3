use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A sellable item from the catalog
///
/// `stock` is the live available quantity; orders keep their own price snapshot
/// and never read the price back from here once placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    pub item_name: String,
    pub category: String,
    pub price: Decimal,
    pub description: String,
    pub stock: u32,
}

/// New absolute stock level for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockUpdate {
    pub item_id: String,
    pub stock: u32,
}

/// One basket line: an item together with the requested quantity
#[derive(Debug, Clone, PartialEq)]
pub struct BasketLine {
    pub item: Item,
    pub quantity: u32,
}

impl BasketLine {
    pub fn new(item: Item, quantity: u32) -> Self {
        Self { item, quantity }
    }

    /// Undiscounted line amount (unit price times quantity)
    pub fn line_total(&self) -> Decimal {
        self.item.price * Decimal::from(self.quantity)
    }
}

/// Request DTO for one basket line
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BasketItemRequest {
    #[validate(length(min = 1, message = "Item id is required"))]
    pub item_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
}
