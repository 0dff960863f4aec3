// HTTP handlers for promotion administration and checkout pricing previews

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::catalog::resolve_basket;
use crate::error::ApiError;
use crate::models::BasketItemRequest;
use crate::promotions::{
    CreateDiscountRequest, CreateReductionRequest, PricingResult, PromotionError, PromotionPricer,
    PromotionResponse, UpdatePromotionRequest,
};

/// Handler for GET /api/promotions
/// Lists every promotion in storage order
pub async fn list_promotions_handler(
    State(state): State<crate::AppState>,
) -> Json<Vec<PromotionResponse>> {
    let now = Utc::now();
    let promotions = state.promotions.list().await;
    tracing::debug!("Listing {} promotions", promotions.len());

    Json(
        promotions
            .into_iter()
            .map(|promotion| PromotionResponse::new(promotion, now))
            .collect(),
    )
}

/// Handler for GET /api/promotions/active
/// Lists the promotions valid right now
pub async fn list_active_promotions_handler(
    State(state): State<crate::AppState>,
) -> Json<Vec<PromotionResponse>> {
    let now = Utc::now();
    Json(
        state
            .promotions
            .list_valid(now)
            .await
            .into_iter()
            .map(|promotion| PromotionResponse::new(promotion, now))
            .collect(),
    )
}

/// Handler for POST /api/promotions/discounts
/// Creates a discount promotion with the next generated id
pub async fn create_discount_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<PromotionResponse>), PromotionError> {
    request.validate()?;

    let promotion = state
        .promotions
        .create(|id| request.into_promotion(id))
        .await?;

    Ok((StatusCode::CREATED, Json(PromotionResponse::new(promotion, Utc::now()))))
}

/// Handler for POST /api/promotions/reductions
/// Creates a full-reduction promotion with the next generated id
pub async fn create_reduction_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<CreateReductionRequest>,
) -> Result<(StatusCode, Json<PromotionResponse>), PromotionError> {
    request.validate()?;

    let promotion = state
        .promotions
        .create(|id| request.into_promotion(id))
        .await?;

    Ok((StatusCode::CREATED, Json(PromotionResponse::new(promotion, Utc::now()))))
}

/// Handler for PUT /api/promotions/{id}
/// Applies the requested edits together; any rejected edit leaves the promotion unchanged
pub async fn update_promotion_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePromotionRequest>,
) -> Result<Json<PromotionResponse>, PromotionError> {
    request.validate()?;

    let promotion = state.promotions.apply_edits(&id, request.into_edits()).await?;

    Ok(Json(PromotionResponse::new(promotion, Utc::now())))
}

/// Handler for POST /api/promotions/{id}/toggle
pub async fn toggle_promotion_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<PromotionResponse>, PromotionError> {
    let promotion = state.promotions.toggle_active(&id).await?;
    Ok(Json(PromotionResponse::new(promotion, Utc::now())))
}

/// Handler for DELETE /api/promotions/{id}
pub async fn delete_promotion_handler(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, PromotionError> {
    state.promotions.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request DTO for a pricing preview
#[derive(Debug, Deserialize, Validate)]
pub struct PricingPreviewRequest {
    #[serde(default)]
    pub items: Vec<BasketItemRequest>,
}

/// One priced basket line of a preview
#[derive(Debug, Serialize)]
pub struct PreviewLine {
    pub item_id: String,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_tag: Option<String>,
}

/// Response DTO for a pricing preview
#[derive(Debug, Serialize)]
pub struct PricingPreviewResponse {
    pub lines: Vec<PreviewLine>,
    #[serde(flatten)]
    pub pricing: PricingResult,
    pub summary: Vec<String>,
}

/// Handler for POST /api/pricing/preview
/// Prices a basket against the promotions valid right now; nothing is reserved or stored
pub async fn preview_pricing_handler(
    State(state): State<crate::AppState>,
    Json(request): Json<PricingPreviewRequest>,
) -> Result<Json<PricingPreviewResponse>, ApiError> {
    request.validate()?;

    let basket = resolve_basket(state.catalog.as_ref(), &request.items).await?;
    let snapshot = state.promotions.snapshot().await;
    let now = Utc::now();

    let pricing = PromotionPricer::price(&basket, &snapshot, now);
    let lines = basket
        .iter()
        .map(|line| PreviewLine {
            item_id: line.item.item_id.clone(),
            item_name: line.item.item_name.clone(),
            unit_price: line.item.price,
            quantity: line.quantity,
            line_total: line.line_total(),
            discount_tag: snapshot
                .active_discount_for(&line.item.item_id, now)
                .map(|discount| discount.display_tag()),
        })
        .collect();

    Ok(Json(PricingPreviewResponse {
        lines,
        summary: pricing.summary_lines(),
        pricing,
    }))
}
