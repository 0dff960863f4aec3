use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::catalog::CatalogError;
use crate::persistence::PersistenceError;

/// Error types for order operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("No orders found for user {0}")]
    NoOrders(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Insufficient stock for {item_name}: requested {requested}, available {available}")]
    InsufficientStock {
        item_name: String,
        requested: u32,
        available: u32,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Failed to save orders: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Item catalog error: {0}")]
    Catalog(String),
}

impl From<CatalogError> for OrderError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ItemNotFound(id) => OrderError::ItemNotFound(id),
            CatalogError::InvalidQuantity { item_id, quantity } => OrderError::InvalidQuantity(
                format!("Quantity {} for item {} must be at least 1", quantity, item_id),
            ),
            CatalogError::Persistence(e) => OrderError::Catalog(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OrderError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            OrderError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            OrderError::ItemNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Item with id {} not found", id),
            ),
            OrderError::NoOrders(_) => (StatusCode::NOT_FOUND, self.to_string()),
            OrderError::InvalidQuantity(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OrderError::InsufficientStock { .. } => (StatusCode::CONFLICT, self.to_string()),
            OrderError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            OrderError::Persistence(e) => {
                tracing::error!("Order persistence failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to save orders".to_string(),
                )
            }
            OrderError::Catalog(msg) => {
                tracing::error!("Item catalog failure: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update item stock".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_item_and_unknown_order_share_not_found() {
        let unknown_item = OrderError::from(CatalogError::ItemNotFound("NOPE".to_string())).into_response();
        assert_eq!(unknown_item.status(), StatusCode::NOT_FOUND);

        let unknown_order = OrderError::NotFound("ORD404".to_string()).into_response();
        assert_eq!(unknown_order.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_shortfall_is_conflict_and_bad_quantity_is_bad_request() {
        let shortfall = OrderError::InsufficientStock {
            item_name: "Lamp".to_string(),
            requested: 3,
            available: 1,
        };
        assert_eq!(shortfall.into_response().status(), StatusCode::CONFLICT);

        let zero = OrderError::from(CatalogError::InvalidQuantity {
            item_id: "X".to_string(),
            quantity: 0,
        });
        assert_eq!(zero.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
