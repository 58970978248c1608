use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use uuid::Uuid;

use super::owned_store;
use crate::auth::{Authorized, SellerRole};
use crate::db::settlements::SellerPayment;
use crate::db::SettlementRepository;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:store_id", get(list_payments))
}

async fn list_payments(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<SellerPayment>>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let payments = SettlementRepository::new(&state.db).payments(store.id).await?;
    Ok(ApiResponse::ok("Payments fetched successfully", payments))
}
