use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Authorized, UserRole};
use crate::db::CartRepository;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::Quantity;
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(view_cart))
        .route("/add", post(add_item))
        .route("/update/:line_id", put(update_quantity))
        .route("/remove/:line_id", delete(remove_line))
        .route("/clear", delete(clear_cart))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub store_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuantityRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    pub store_id: Option<Uuid>,
}

async fn view_cart(State(state): State<AppState>, auth: Authorized<UserRole>) -> Result<ApiResponse<Vec<Cart>>, AppError> {
    let carts = CartRepository::new(&state.db).view(auth.user_id).await?;
    Ok(ApiResponse::ok("Cart fetched successfully", carts))
}

async fn add_item(
    State(state): State<AppState>,
    auth: Authorized<UserRole>,
    Validated(req): Validated<AddItemRequest>,
) -> Result<ApiResponse<Cart>, AppError> {
    let quantity = Quantity::new(req.quantity).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let cart = CartRepository::new(&state.db).add_item(auth.user_id, req.store_id, req.product_id, quantity).await?;
    tracing::debug!(cart_id = %cart.id, product_id = %req.product_id, "item added to cart");
    Ok(ApiResponse::ok("Item added to cart", cart))
}

async fn update_quantity(
    State(state): State<AppState>,
    auth: Authorized<UserRole>,
    Path(line_id): Path<Uuid>,
    Validated(req): Validated<UpdateQuantityRequest>,
) -> Result<ApiResponse<Cart>, AppError> {
    let cart = CartRepository::new(&state.db).update_quantity(auth.user_id, line_id, req.quantity).await?;
    Ok(ApiResponse::ok("Cart updated successfully", cart))
}

async fn remove_line(
    State(state): State<AppState>,
    auth: Authorized<UserRole>,
    Path(line_id): Path<Uuid>,
) -> Result<ApiResponse<Cart>, AppError> {
    let cart = CartRepository::new(&state.db).remove_line(auth.user_id, line_id).await?;
    Ok(ApiResponse::ok("Item removed from cart", cart))
}

async fn clear_cart(
    State(state): State<AppState>,
    auth: Authorized<UserRole>,
    Query(params): Query<ClearParams>,
) -> Result<ApiResponse<Vec<Cart>>, AppError> {
    let carts = CartRepository::new(&state.db).clear(auth.user_id, params.store_id).await?;
    Ok(ApiResponse::ok("Cart cleared successfully", carts))
}
