use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::orders::{Order, OrderItem, OrderStatus};
use crate::persistence::{self, PersistenceError, Record};

pub const ORDERS_HEADER: &str =
    "order_id,user_id,items,order_time,total_amount,shipping_address,status,status_change_time";

/// Repository for the orders file
///
/// Items are stored in one field as `item_id:item_name:price:quantity` entries joined
/// by `;`, with `\`, `:` and `;` backslash-escaped inside each component.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    path: PathBuf,
}

impl OrderRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every well-formed order in file order
    ///
    /// A missing file is an empty collection. Malformed records and repeated ids are
    /// skipped with a warning.
    pub async fn load(&self) -> Result<Vec<Order>, PersistenceError> {
        let Some(records) = persistence::read_records(&self.path).await? else {
            tracing::info!("No orders file at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut orders = Vec::with_capacity(records.len());
        for record in &records {
            match decode_order(record) {
                Ok(order) if seen.insert(order.id.clone()) => orders.push(order),
                Ok(order) => tracing::warn!(
                    "Skipping duplicate order {} at {}:{}",
                    order.id,
                    self.path.display(),
                    record.line
                ),
                Err(message) => {
                    let error = PersistenceError::Malformed {
                        path: self.path.clone(),
                        line: record.line,
                        message,
                    };
                    tracing::warn!("Skipping order record: {}", error);
                }
            }
        }

        tracing::debug!("Loaded {} orders", orders.len());
        Ok(orders)
    }

    pub async fn save(&self, orders: &[Order]) -> Result<(), PersistenceError> {
        persistence::write_atomically(&self.path, ORDERS_HEADER, orders.iter().map(encode_order).collect())
            .await
    }
}

pub fn encode_order(order: &Order) -> String {
    let items = order
        .items
        .iter()
        .map(|item| {
            [
                persistence::escape_component(&item.item_id),
                persistence::escape_component(&item.item_name),
                item.unit_price.to_string(),
                item.quantity.to_string(),
            ]
            .join(":")
        })
        .collect::<Vec<_>>()
        .join(";");

    persistence::join_record([
        order.id.clone(),
        order.user_id.clone(),
        items,
        persistence::format_timestamp(&order.created_at),
        order.total_amount.to_string(),
        order.shipping_address.clone(),
        order.status.record_name().to_string(),
        persistence::format_timestamp(&order.status_changed_at),
    ])
}

pub fn decode_order(record: &Record) -> Result<Order, String> {
    let [id, user_id, items, created_at, total, address, status, changed_at] =
        record.fields.as_slice()
    else {
        return Err(format!("expected 8 fields, found {}", record.fields.len()));
    };

    if id.is_empty() {
        return Err("missing order id".to_string());
    }

    let created_at = persistence::parse_timestamp(created_at)
        .ok_or_else(|| format!("invalid order time {:?}", created_at))?;
    let status_changed_at = persistence::parse_timestamp(changed_at)
        .ok_or_else(|| format!("invalid status change time {:?}", changed_at))?;

    Ok(Order {
        id: id.clone(),
        user_id: user_id.clone(),
        items: decode_items(items)?,
        total_amount: persistence::parse_decimal(total)
            .ok_or_else(|| format!("invalid total {:?}", total))?,
        shipping_address: address.clone(),
        created_at,
        status: status.parse::<OrderStatus>()?,
        status_changed_at,
    })
}

fn decode_items(field: &str) -> Result<Vec<OrderItem>, String> {
    if field.is_empty() {
        return Ok(Vec::new());
    }

    persistence::split_escaped(field, ';')
        .iter()
        .map(|entry| {
            let parts: Vec<String> = persistence::split_escaped(entry, ':')
                .iter()
                .map(|part| persistence::unescape_component(part))
                .collect();
            let [item_id, item_name, price, quantity] = parts.as_slice() else {
                return Err(format!("invalid order item {:?}", entry));
            };

            Ok(OrderItem {
                item_id: item_id.clone(),
                item_name: item_name.clone(),
                unit_price: persistence::parse_decimal(price)
                    .ok_or_else(|| format!("invalid item price {:?}", price))?,
                quantity: quantity
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid item quantity {:?}", quantity))?,
            })
        })
        .collect()
}
