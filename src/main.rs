pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod orders;
pub mod persistence;
pub mod promotions;
pub mod validation;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use catalog::{CatalogError, FileItemCatalog, ItemCatalog};
use config::AppConfig;
use error::ApiError;
use models::Item;
use orders::{OrderBook, OrderRepository};
use promotions::{PromotionCatalog, PromotionRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn ItemCatalog>,
    pub promotions: Arc<PromotionCatalog>,
    pub orders: Arc<OrderBook>,
}

/// Load the item catalog, promotions and orders named by the configuration
///
/// Missing files start empty; unreadable files are an error.
pub async fn build_state(config: &AppConfig) -> Result<AppState, CatalogError> {
    let catalog: Arc<dyn ItemCatalog> = Arc::new(FileItemCatalog::load(&config.items_file).await?);
    let promotions =
        PromotionCatalog::load(PromotionRepository::new(&config.promotions_file)).await?;
    let orders = OrderBook::load(OrderRepository::new(&config.orders_file), catalog.clone()).await?;

    Ok(AppState {
        catalog,
        promotions: Arc::new(promotions),
        orders: Arc::new(orders),
    })
}

/// Handler for GET /api/items
/// Lists the catalog items customers can put in a basket
async fn list_items_handler(State(state): State<AppState>) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state.catalog.list_items().await?;
    tracing::debug!("Retrieved {} items", items.len());
    Ok(Json(items))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/items", get(list_items_handler))
        // Promotion administration
        .route("/api/promotions", get(promotions::list_promotions_handler))
        .route("/api/promotions/active", get(promotions::list_active_promotions_handler))
        .route("/api/promotions/discounts", post(promotions::create_discount_handler))
        .route("/api/promotions/reductions", post(promotions::create_reduction_handler))
        .route(
            "/api/promotions/:id",
            put(promotions::update_promotion_handler).delete(promotions::delete_promotion_handler),
        )
        .route("/api/promotions/:id/toggle", post(promotions::toggle_promotion_handler))
        .route("/api/pricing/preview", post(promotions::preview_pricing_handler))
        // Orders
        .route(
            "/api/orders",
            post(orders::create_order_handler).get(orders::list_orders_handler),
        )
        .route("/api/orders/:id", get(orders::get_order_by_id_handler))
        .route("/api/orders/:id/status", put(orders::update_order_status_handler))
        .route("/api/users/:user_id/orders", get(orders::get_user_orders_handler))
        .route("/api/users/:user_id/report", get(orders::get_user_report_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Retail API - Starting...");

    let config = AppConfig::from_env().expect("Invalid configuration");

    tracing::info!(
        "Loading data files: items={}, promotions={}, orders={}",
        config.items_file.display(),
        config.promotions_file.display(),
        config.orders_file.display()
    );
    let state = build_state(&config).await.expect("Failed to load data files");

    if config.auto_update_enabled {
        state
            .orders
            .enable_auto_update(config.lifecycle_durations(), config.poll_interval())
            .await;
    } else {
        tracing::info!("Automatic order status updates are disabled");
    }

    let orders = state.orders.clone();
    let app = create_router(state);

    let addr = config.bind_address();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Retail API is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    orders.disable_auto_update().await;
    tracing::info!("Retail API stopped");
}
