use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{owned_store, seller_of};
use crate::auth::{Authorized, SellerRole};
use crate::db::orders::Page;
use crate::db::settlements::SellerBalance;
use crate::db::stores::Store;
use crate::db::users::Seller;
use crate::db::{OrderRepository, SettlementRepository, StoreRepository, UserRepository};
use crate::domain::aggregates::{Order, OrderStatus, Settlement};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/profile", get(profile))
        .route("/orders/:store_id", get(store_orders))
        .route("/balance/:store_id", get(balance))
        .route("/settlements/:store_id", get(settlements))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterSellerRequest {
    #[validate(length(min = 1, max = 200, message = "Business name is required"))]
    pub business_name: String,
}

#[derive(Debug, Serialize)]
pub struct SellerProfile {
    #[serde(flatten)]
    pub seller: Seller,
    pub stores: Vec<Store>,
}

#[derive(Debug, Deserialize)]
pub struct StoreOrdersParams {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

async fn register(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Validated(req): Validated<RegisterSellerRequest>,
) -> Result<(StatusCode, ApiResponse<Seller>), AppError> {
    let seller = UserRepository::new(&state.db).create_seller(auth.user_id, &req.business_name).await?;
    tracing::info!(seller_id = %seller.id, user_id = %auth.user_id, "seller registered");
    Ok(ApiResponse::created("Seller registered successfully", seller))
}

async fn profile(State(state): State<AppState>, auth: Authorized<SellerRole>) -> Result<ApiResponse<SellerProfile>, AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let stores = StoreRepository::new(&state.db).list_for_seller(seller.id).await?;
    Ok(ApiResponse::ok("Seller profile fetched successfully", SellerProfile { seller, stores }))
}

async fn store_orders(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
    Query(params): Query<StoreOrdersParams>,
) -> Result<ApiResponse<Vec<Order>>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let page = Page {
        limit: params.limit.unwrap_or(20).clamp(1, 100),
        offset: params.offset.unwrap_or(0).max(0),
    };
    let orders = OrderRepository::new(&state.db).list_for_store(store.id, params.status, page).await?;
    Ok(ApiResponse::ok("Store orders fetched successfully", orders))
}

async fn balance(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
) -> Result<ApiResponse<SellerBalance>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let balance = SettlementRepository::new(&state.db).balance(store.id).await?;
    Ok(ApiResponse::ok("Balance fetched successfully", balance))
}

async fn settlements(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Settlement>>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let settlements = SettlementRepository::new(&state.db).list_for_store(store.id).await?;
    Ok(ApiResponse::ok("Settlements fetched successfully", settlements))
}
