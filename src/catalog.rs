// Item catalog
// Source of item names, prices and live stock for pricing and order placement

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{BasketItemRequest, BasketLine, Item, StockUpdate};
use crate::persistence::{self, PersistenceError, Record};

const ITEMS_HEADER: &str = "item_id,item_name,category,price,description,stock";

/// Error types for catalog lookups and stock commits
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid quantity {quantity} for item {item_id}")]
    InvalidQuantity { item_id: String, quantity: u32 },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Read and stock-commit access to the items being sold
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn find_item(&self, item_id: &str) -> Result<Option<Item>, CatalogError>;

    async fn list_items(&self) -> Result<Vec<Item>, CatalogError>;

    /// Apply a batch of absolute stock levels as one write.
    ///
    /// Either every update is applied or, when an id is unknown, none is.
    async fn commit_stock(&self, updates: &[StockUpdate]) -> Result<(), CatalogError>;
}

/// Catalog backed by a comma-separated items file
pub struct FileItemCatalog {
    path: PathBuf,
    items: RwLock<Vec<Item>>,
}

impl FileItemCatalog {
    /// Load the catalog from `path`; a missing file gives an empty catalog
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let items = match persistence::read_records(&path).await? {
            Some(records) => records
                .iter()
                .filter_map(|record| match parse_item(record) {
                    Ok(item) => Some(item),
                    Err(message) => {
                        tracing::warn!(
                            "Skipping item record at {}:{}: {}",
                            path.display(),
                            record.line,
                            message
                        );
                        None
                    }
                })
                .collect(),
            None => {
                tracing::info!("No items file at {}, starting empty", path.display());
                Vec::new()
            }
        };

        tracing::info!("Loaded {} items", items.len());
        Ok(Self {
            path,
            items: RwLock::new(items),
        })
    }

    /// Catalog with the given items; nothing is written until stock is committed
    pub fn with_items(path: impl Into<PathBuf>, items: Vec<Item>) -> Self {
        Self {
            path: path.into(),
            items: RwLock::new(items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ItemCatalog for FileItemCatalog {
    async fn find_item(&self, item_id: &str) -> Result<Option<Item>, CatalogError> {
        let items = self.items.read().await;
        Ok(items.iter().find(|item| item.item_id == item_id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<Item>, CatalogError> {
        Ok(self.items.read().await.clone())
    }

    async fn commit_stock(&self, updates: &[StockUpdate]) -> Result<(), CatalogError> {
        let mut items = self.items.write().await;

        let mut positions = HashMap::with_capacity(updates.len());
        for update in updates {
            let index = items
                .iter()
                .position(|item| item.item_id == update.item_id)
                .ok_or_else(|| CatalogError::ItemNotFound(update.item_id.clone()))?;
            positions.insert(index, update.stock);
        }

        // Memory only changes once the file holds the new levels
        let mut updated = items.clone();
        for (index, stock) in positions {
            updated[index].stock = stock;
        }

        persistence::write_atomically(&self.path, ITEMS_HEADER, updated.iter().map(format_item).collect())
            .await?;
        *items = updated;

        tracing::debug!("Committed stock for {} items", updates.len());
        Ok(())
    }
}

/// Turn `(item_id, quantity)` requests into priced basket lines, in request order
///
/// # Returns
/// `ItemNotFound` for an unknown id, `InvalidQuantity` for a zero quantity
pub async fn resolve_basket(
    catalog: &dyn ItemCatalog,
    requests: &[BasketItemRequest],
) -> Result<Vec<BasketLine>, CatalogError> {
    let mut lines = Vec::with_capacity(requests.len());

    for request in requests {
        if request.quantity == 0 {
            return Err(CatalogError::InvalidQuantity {
                item_id: request.item_id.clone(),
                quantity: request.quantity,
            });
        }

        let item = catalog
            .find_item(&request.item_id)
            .await?
            .ok_or_else(|| CatalogError::ItemNotFound(request.item_id.clone()))?;

        lines.push(BasketLine::new(item, request.quantity));
    }

    Ok(lines)
}

fn parse_item(record: &Record) -> Result<Item, String> {
    let [item_id, item_name, category, price, description, stock] = record.fields.as_slice() else {
        return Err(format!("expected 6 fields, found {}", record.fields.len()));
    };

    if item_id.is_empty() {
        return Err("missing item id".to_string());
    }

    Ok(Item {
        item_id: item_id.clone(),
        item_name: item_name.clone(),
        category: category.clone(),
        price: persistence::parse_decimal(price).ok_or_else(|| format!("invalid price {:?}", price))?,
        description: description.clone(),
        stock: stock
            .parse()
            .map_err(|_| format!("invalid stock {:?}", stock))?,
    })
}

fn format_item(item: &Item) -> String {
    persistence::join_record([
        item.item_id.clone(),
        item.item_name.clone(),
        item.category.clone(),
        item.price.to_string(),
        item.description.clone(),
        item.stock.to_string(),
    ])
}
