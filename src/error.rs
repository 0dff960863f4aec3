// Error handling module for the retail API
// Provides the general error type for catalog and pricing endpoints and its HTTP response form

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error};
use validator::{ValidationError, ValidationErrors};

use crate::catalog::CatalogError;

/// Main error type for endpoints that are not owned by the promotion or order modules
///
/// Each variant maps to a specific HTTP status code and error response format.
#[derive(Debug)]
pub enum ApiError {
    /// Request validation failed
    /// Maps to HTTP 400 Bad Request
    ValidationError(ValidationErrors),

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Internal server errors, including failed data file writes
    /// Maps to HTTP 500; details are logged, not returned
    InternalError(String),
}

/// Consistent error response structure
///
/// Carries both a machine-readable `error_code` and a human-readable `message`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR", "NOT_FOUND")
    pub error_code: String,

    pub message: String,

    /// Field-level validation errors, omitted when None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// RFC 3339 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    /// Convert ApiError to HTTP status code and ErrorResponse
    ///
    /// Client errors are logged at debug level, server errors at error level.
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        let (error_code, message, details) = match self {
            ApiError::ValidationError(errors) => {
                debug!("Validation error: {:?}", errors);
                (
                    "VALIDATION_ERROR",
                    "Request validation failed".to_string(),
                    Some(serde_json::to_value(errors).unwrap_or(serde_json::json!({}))),
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                ("NOT_FOUND", format!("{} with id {} not found", resource, id), None)
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                ("INTERNAL_ERROR", "An internal server error occurred".to_string(), None)
            }
        };

        (
            self.status_code(),
            ErrorResponse {
                error_code: error_code.to_string(),
                message,
                details,
                timestamp: Utc::now().to_rfc3339(),
            },
        )
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Single-field validation failure
    pub fn invalid_field(field: &'static str, code: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new(code));
        ApiError::ValidationError(errors)
    }
}

/// Convert validator errors to ApiError
impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::ValidationError(errors)
    }
}

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::ItemNotFound(id) => ApiError::NotFound {
                resource: "Item".to_string(),
                id,
            },
            CatalogError::InvalidQuantity { .. } => {
                ApiError::invalid_field("quantity", "quantity_must_be_positive")
            }
            CatalogError::Persistence(e) => ApiError::InternalError(e.to_string()),
        }
    }
}
