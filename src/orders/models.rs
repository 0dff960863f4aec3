use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::models::{BasketItemRequest, BasketLine, StockUpdate};
use crate::orders::{OrderError, PriceCalculator};
use crate::persistence::{format_display_time, format_money};
use crate::validation::validate_not_blank;

/// Order status enum representing the lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Status text shown in order tables
    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
        }
    }

    /// Status text stored in the orders file
    pub fn record_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    /// Parse status from string, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One purchased line with the price frozen at purchase time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: String,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    pub fn subtotal(&self) -> Decimal {
        PriceCalculator::calculate_subtotal(self.quantity, self.unit_price)
    }
}

/// A completed purchase
///
/// Everything except `status` and `status_changed_at` is fixed once placed.
/// `total_amount` is the pre-promotion sum of the item snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub status_changed_at: DateTime<Utc>,
}

/// A freshly placed order and the stock levels that placing it implies
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order: Order,
    pub stock_updates: Vec<StockUpdate>,
}

impl Order {
    /// Build an order from a basket, checking every line against stock first
    ///
    /// Lines for the same item draw on one shared stock figure. The first line that
    /// exceeds what is left fails the whole basket and nothing is produced.
    ///
    /// # Arguments
    /// * `user_id` - Buyer
    /// * `lines` - Basket lines carrying the live item (price and stock)
    /// * `shipping_address` - Delivery address
    /// * `now` - Creation instant, also the first status change
    ///
    /// # Returns
    /// The Pending order plus the new absolute stock level of each item touched
    pub fn place(
        user_id: &str,
        lines: &[BasketLine],
        shipping_address: &str,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, OrderError> {
        if user_id.trim().is_empty() {
            return Err(OrderError::ValidationError("User id is required".to_string()));
        }
        if lines.is_empty() {
            return Err(OrderError::ValidationError(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut stock_updates: Vec<StockUpdate> = Vec::new();
        for line in lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity(format!(
                    "Quantity for {} must be at least 1",
                    line.item.item_name
                )));
            }

            let index = match stock_updates
                .iter()
                .position(|update| update.item_id == line.item.item_id)
            {
                Some(index) => index,
                None => {
                    stock_updates.push(StockUpdate {
                        item_id: line.item.item_id.clone(),
                        stock: line.item.stock,
                    });
                    stock_updates.len() - 1
                }
            };
            let remaining = &mut stock_updates[index];

            if line.quantity > remaining.stock {
                return Err(OrderError::InsufficientStock {
                    item_name: line.item.item_name.clone(),
                    requested: line.quantity,
                    available: remaining.stock,
                });
            }
            remaining.stock -= line.quantity;
        }

        let items: Vec<OrderItem> = lines
            .iter()
            .map(|line| OrderItem {
                item_id: line.item.item_id.clone(),
                item_name: line.item.item_name.clone(),
                unit_price: line.item.price,
                quantity: line.quantity,
            })
            .collect();

        let order = Order {
            id: generate_order_id(user_id, now, 0),
            user_id: user_id.to_string(),
            total_amount: PriceCalculator::calculate_total(&items),
            items,
            shipping_address: shipping_address.to_string(),
            created_at: now,
            status: OrderStatus::Pending,
            status_changed_at: now,
        };

        Ok(PlacedOrder {
            order,
            stock_updates,
        })
    }

    /// Replace the status and record the change time
    ///
    /// No transition rules are applied here. The change time never moves backwards.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.status_changed_at = self.status_changed_at.max(now);
    }

    /// Time spent in the current status
    pub fn elapsed_in_status(&self, now: DateTime<Utc>) -> Duration {
        now - self.status_changed_at
    }

    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Derive an order id from the buyer and the creation instant
///
/// SHA-256 over `"{user_id}_{unix_millis}"`, with `"_{salt}"` appended for a non-zero
/// salt. The first eight digest bytes, reduced to sixteen decimal digits, follow `ORD`.
pub fn generate_order_id(user_id: &str, created_at: DateTime<Utc>, salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", user_id, created_at.timestamp_millis()).as_bytes());
    if salt > 0 {
        hasher.update(format!("_{}", salt).as_bytes());
    }
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("ORD{:016}", u64::from_be_bytes(prefix) % 10_000_000_000_000_000)
}

/// Request DTO for creating a new order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 64), custom = "validate_not_blank")]
    pub user_id: String,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<BasketItemRequest>,
    #[validate(length(max = 200), custom = "validate_not_blank")]
    pub shipping_address: String,
}

/// Request DTO for an administrator status override
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Response DTO for an order with display text
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: Decimal,
    pub total_text: String,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub status_text: &'static str,
    pub created_at: DateTime<Utc>,
    pub created_at_text: String,
    pub status_changed_at: DateTime<Utc>,
    pub status_changed_at_text: String,
}

/// Response DTO for order item
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub item_id: String,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            subtotal: item.subtotal(),
            item_id: item.item_id,
            item_name: item.item_name,
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            total_text: format_money(order.total_amount),
            status_text: order.status.display_name(),
            created_at_text: format_display_time(&order.created_at),
            status_changed_at_text: format_display_time(&order.status_changed_at),
            id: order.id,
            user_id: order.user_id,
            items: order.items.into_iter().map(OrderItemResponse::from).collect(),
            total_amount: order.total_amount,
            shipping_address: order.shipping_address,
            status: order.status,
            created_at: order.created_at,
            status_changed_at: order.status_changed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Item;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap()
    }

    fn line(id: &str, price: Decimal, stock: u32, quantity: u32) -> BasketLine {
        BasketLine::new(
            Item {
                item_id: id.to_string(),
                item_name: format!("Item {}", id),
                category: "General".to_string(),
                price,
                description: String::new(),
                stock,
            },
            quantity,
        )
    }

    #[test]
    fn test_status_parsing_ignores_case() {
        assert_eq!("PENDING".parse::<OrderStatus>(), Ok(OrderStatus::Pending));
        assert_eq!("Shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert_eq!(" delivered ".parse::<OrderStatus>(), Ok(OrderStatus::Delivered));
        assert!("cancelled".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_names() {
        assert_eq!(OrderStatus::Shipped.as_str(), "shipped");
        assert_eq!(OrderStatus::Shipped.display_name(), "Shipped");
        assert_eq!(OrderStatus::Shipped.record_name(), "SHIPPED");
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_place_single_line() {
        let placed = Order::place("u1", &[line("X", dec!(100), 5, 2)], "1 High St", now()).unwrap();

        assert_eq!(placed.order.total_amount, dec!(200));
        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(placed.order.status_changed_at, placed.order.created_at);
        assert_eq!(placed.order.items[0].unit_price, dec!(100));
        assert_eq!(
            placed.stock_updates,
            vec![StockUpdate {
                item_id: "X".to_string(),
                stock: 3
            }]
        );
    }

    #[test]
    fn test_place_fails_on_first_short_line() {
        let result = Order::place(
            "u1",
            &[line("A", dec!(1), 10, 2), line("B", dec!(1), 1, 4)],
            "1 High St",
            now(),
        );

        match result {
            Err(OrderError::InsufficientStock {
                item_name,
                requested,
                available,
            }) => {
                assert_eq!(item_name, "Item B");
                assert_eq!(requested, 4);
                assert_eq!(available, 1);
            }
            other => panic!("expected insufficient stock, got {:?}", other),
        }
    }

    #[test]
    fn test_repeated_item_lines_share_stock() {
        let result = Order::place(
            "u1",
            &[line("A", dec!(1), 5, 3), line("A", dec!(1), 5, 3)],
            "1 High St",
            now(),
        );
        assert!(matches!(
            result,
            Err(OrderError::InsufficientStock { requested: 3, available: 2, .. })
        ));

        let placed = Order::place(
            "u1",
            &[line("A", dec!(1), 5, 3), line("A", dec!(1), 5, 2)],
            "1 High St",
            now(),
        )
        .unwrap();
        assert_eq!(placed.stock_updates[0].stock, 0);
        assert_eq!(placed.order.line_count(), 2);
        assert_eq!(placed.order.unit_count(), 5);
    }

    #[test]
    fn test_place_rejects_empty_basket_and_zero_quantity() {
        assert!(matches!(
            Order::place("u1", &[], "1 High St", now()),
            Err(OrderError::ValidationError(_))
        ));
        assert!(matches!(
            Order::place("u1", &[line("A", dec!(1), 5, 0)], "1 High St", now()),
            Err(OrderError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_set_status_refreshes_change_time() {
        let mut order = Order::place("u1", &[line("A", dec!(1), 5, 1)], "1 High St", now())
            .unwrap()
            .order;

        let later = now() + Duration::seconds(30);
        order.set_status(OrderStatus::Shipped, later);
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.status_changed_at, later);
        assert_eq!(order.elapsed_in_status(later + Duration::seconds(5)), Duration::seconds(5));

        order.set_status(OrderStatus::Delivered, now());
        assert_eq!(order.status_changed_at, later);
    }

    #[test]
    fn test_order_id_shape_and_determinism() {
        let id = generate_order_id("u1", now(), 0);
        assert_eq!(id.len(), 19);
        assert!(id.starts_with("ORD"));
        assert!(id[3..].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(id, generate_order_id("u1", now(), 0));
    }

    #[test]
    fn test_order_id_varies_with_salt_user_and_time() {
        let base = generate_order_id("u1", now(), 0);
        assert_ne!(base, generate_order_id("u1", now(), 1));
        assert_ne!(base, generate_order_id("u2", now(), 0));
        assert_ne!(base, generate_order_id("u1", now() + Duration::milliseconds(1), 0));
    }

    #[test]
    fn test_order_response_display_text() {
        let order = Order::place("u1", &[line("A", dec!(19.5), 5, 2)], "1 High St", now())
            .unwrap()
            .order;
        let response = OrderResponse::from(order);

        assert_eq!(response.total_text, "39.00");
        assert_eq!(response.status_text, "Pending");
        assert_eq!(response.created_at_text, "2026-07-01 09:00:00");
        assert_eq!(response.items[0].subtotal, dec!(39));
    }

    #[test]
    fn test_create_order_request_validation() {
        let request = CreateOrderRequest {
            user_id: "u1".to_string(),
            items: vec![],
            shipping_address: "1 High St".to_string(),
        };
        assert!(request.validate().is_err());

        let request = CreateOrderRequest {
            user_id: "u1".to_string(),
            items: vec![BasketItemRequest {
                item_id: "A".to_string(),
                quantity: 1,
            }],
            shipping_address: "   ".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
