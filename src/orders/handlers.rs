// HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::catalog::resolve_basket;
use crate::orders::{CreateOrderRequest, OrderError, OrderResponse, UpdateStatusRequest};

/// Handler for POST /api/orders
/// Places an order; stock is checked and committed for the whole basket or not at all
pub async fn create_order_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), OrderError> {
    request.validate()?;

    let basket = resolve_basket(state.catalog.as_ref(), &request.items).await?;
    let order = state
        .orders
        .create(&request.user_id, &basket, &request.shipping_address)
        .await?;

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// Handler for GET /api/orders
pub async fn list_orders_handler(State(state): State<crate::AppState>) -> Json<Vec<OrderResponse>> {
    let orders = state.orders.list_all().await;
    tracing::debug!("Listing {} orders", orders.len());

    Json(orders.into_iter().map(OrderResponse::from).collect())
}

/// Handler for GET /api/orders/:id
pub async fn get_order_by_id_handler(
    State(state): State<crate::AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state
        .orders
        .find_by_id(&order_id)
        .await
        .ok_or(OrderError::NotFound(order_id))?;

    Ok(Json(order.into()))
}

/// Handler for GET /api/users/:user_id/orders
/// Unknown users simply have no orders
pub async fn get_user_orders_handler(
    State(state): State<crate::AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<OrderResponse>> {
    Json(
        state
            .orders
            .find_by_user(&user_id)
            .await
            .into_iter()
            .map(OrderResponse::from)
            .collect(),
    )
}

/// Handler for PUT /api/orders/:id/status
/// Administrator override, any status may be set
pub async fn update_order_status_handler(
    State(state): State<crate::AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, OrderError> {
    let order = state.orders.set_status(&order_id, request.status).await?;

    Ok(Json(order.into()))
}

/// Query parameters for GET /api/users/:user_id/report
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

/// Handler for GET /api/users/:user_id/report
/// Purchase statistics by category and item; `?format=csv` returns a CSV download
pub async fn get_user_report_handler(
    State(state): State<crate::AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Response, OrderError> {
    let csv = match query.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(other) => {
            return Err(OrderError::ValidationError(format!(
                "Unsupported report format: {}",
                other
            )))
        }
    };

    let report = state.orders.customer_report(&user_id, Utc::now()).await?;
    if !csv {
        return Ok(Json(report).into_response());
    }

    let disposition = format!("attachment; filename=\"{}\"", report.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.to_csv(),
    )
        .into_response())
}
