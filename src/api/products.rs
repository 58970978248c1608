use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::owned_store;
use crate::auth::{Authorized, SellerRole};
use crate::db::products::{NewProduct, ProductFilter};
use crate::db::ProductRepository;
use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/stock", put(set_stock))
        .route("/stock/:name", get(stock_by_name))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub store_id: Option<Uuid>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub store_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetStockRequest {
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
}

#[derive(Debug, Serialize)]
pub struct StockView {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub stock: String,
}

async fn list_products(State(state): State<AppState>, Query(p): Query<ListParams>) -> Result<ApiResponse<Vec<Product>>, AppError> {
    let filter = ProductFilter {
        store_id: p.store_id,
        category: p.category.as_deref(),
        limit: p.limit.unwrap_or(20).clamp(1, 100),
        offset: p.offset.unwrap_or(0).max(0),
    };
    let products = ProductRepository::new(&state.db).list(&filter).await?;
    Ok(ApiResponse::ok("Products fetched successfully", products))
}

async fn create_product(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Validated(req): Validated<CreateProductRequest>,
) -> Result<(StatusCode, ApiResponse<Product>), AppError> {
    let price = Money::new(req.price).round_cents();
    if price.is_negative() {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }
    let store = owned_store(&state, &auth, req.store_id).await?;
    let product = ProductRepository::new(&state.db)
        .create(NewProduct {
            store_id: store.id,
            name: &req.name,
            category: req.category.as_deref(),
            price,
            stock: req.stock,
            images: &req.images,
        })
        .await?;
    tracing::info!(product_id = %product.id, store_id = %store.id, "product added");
    Ok(ApiResponse::created("Product added successfully", product))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiResponse<Product>, AppError> {
    let product = ProductRepository::new(&state.db).get(id).await?;
    Ok(ApiResponse::ok("Product fetched successfully", product))
}

async fn set_stock(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(id): Path<Uuid>,
    Validated(req): Validated<SetStockRequest>,
) -> Result<ApiResponse<Product>, AppError> {
    let products = ProductRepository::new(&state.db);
    let product = products.get(id).await?;
    owned_store(&state, &auth, product.store_id).await?;
    let product = products.set_stock(id, req.stock).await?;
    Ok(ApiResponse::ok("Stock updated successfully", product))
}

async fn stock_by_name(State(state): State<AppState>, Path(name): Path<String>) -> Result<ApiResponse<Vec<StockView>>, AppError> {
    let levels = ProductRepository::new(&state.db).stock_by_name(&name).await?;
    let views = levels
        .into_iter()
        .map(|l| StockView { stock: l.label(), product_id: l.id, store_id: l.store_id, name: l.name })
        .collect();
    Ok(ApiResponse::ok("Stock fetched successfully", views))
}
