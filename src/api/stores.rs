use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::seller_of;
use crate::auth::{Authorized, SellerRole};
use crate::db::stores::Store;
use crate::db::StoreRepository;
use crate::error::AppError;
use crate::response::{ApiResponse, Pagination};
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stores).post(create_store))
        .route("/:id", get(get_store))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStoreRequest {
    #[validate(length(min = 1, max = 120, message = "Store name is required"))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

async fn create_store(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Validated(req): Validated<CreateStoreRequest>,
) -> Result<(StatusCode, ApiResponse<Store>), AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let store = StoreRepository::new(&state.db).create(seller.id, &req.name, req.address.as_deref()).await?;
    tracing::info!(store_id = %store.id, seller_id = %seller.id, "store created");
    Ok(ApiResponse::created("Store created successfully", store))
}

async fn list_stores(State(state): State<AppState>, Query(page): Query<Pagination>) -> Result<ApiResponse<Vec<Store>>, AppError> {
    let stores = StoreRepository::new(&state.db).list(page.limit(20), page.offset()).await?;
    Ok(ApiResponse::ok("Stores fetched successfully", stores))
}

async fn get_store(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<ApiResponse<Store>, AppError> {
    let store = StoreRepository::new(&state.db).get(id).await?;
    Ok(ApiResponse::ok("Store fetched successfully", store))
}
