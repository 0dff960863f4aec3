use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::persistence::PersistenceError;

/// Error types for promotion administration
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("Promotion not found: {0}")]
    NotFound(String),

    #[error("Promotion id already exists: {0}")]
    DuplicateId(String),

    #[error("Promotion {id} is not a {expected} promotion")]
    KindMismatch { id: String, expected: &'static str },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Failed to save promotions: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<validator::ValidationErrors> for PromotionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        PromotionError::ValidationError(errors.to_string())
    }
}

impl IntoResponse for PromotionError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            PromotionError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            PromotionError::DuplicateId(_) => (StatusCode::CONFLICT, self.to_string()),
            PromotionError::KindMismatch { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            PromotionError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            PromotionError::Persistence(e) => {
                tracing::error!("Promotion persistence failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to save promotions".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
