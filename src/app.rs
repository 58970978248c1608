//! Router assembly.

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::error::AppError;
use crate::state::AppState;

pub const SERVICE_NAME: &str = "marketplace-commerce";

/// Every resource router, mounted under the configured API prefix, plus `/health`.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/user", api::users::routes())
        .nest("/store", api::stores::routes())
        .nest("/product", api::products::routes())
        .nest("/cart", api::cart::routes())
        .nest("/order", api::orders::routes())
        .nest("/seller", api::seller::routes())
        .nest("/admin", api::admin::routes())
        .nest("/payments", api::payments::routes())
        .nest("/dashboard", api::dashboard::routes())
        .nest("/notifications", api::notifications::routes())
        .nest("/settings", api::settings::routes())
        .nest("/support", api::support::routes());

    let prefix = state.config.api_prefix.clone();
    let router = if prefix.is_empty() { api } else { Router::new().nest(&prefix, api) };

    router
        .route("/health", get(health))
        .fallback(|| async { AppError::NotFound("Route not found".to_string()) })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": SERVICE_NAME }))
}
