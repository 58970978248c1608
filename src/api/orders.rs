use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthUser, Authorized, UserRole};
use crate::db::orders::{Actor, Page};
use crate::db::OrderRepository;
use crate::domain::aggregates::{Order, OrderStatus};
use crate::error::AppError;
use crate::response::{ApiResponse, Pagination};
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/review", post(review_order))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub store_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewCreated {
    pub review_id: Uuid,
}

impl From<AuthUser> for Actor {
    fn from(auth: AuthUser) -> Self {
        Self { user_id: auth.user_id, role: auth.role }
    }
}

async fn checkout(
    State(state): State<AppState>,
    auth: Authorized<UserRole>,
    Validated(req): Validated<CheckoutRequest>,
) -> Result<(StatusCode, ApiResponse<Order>), AppError> {
    let mut order = OrderRepository::new(&state.db)
        .checkout(auth.user_id, req.store_id, state.config.low_stock_threshold)
        .await?;
    state.events.publish(order.take_events()).await;
    Ok(ApiResponse::created("Order placed successfully", order))
}

async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<Pagination>,
) -> Result<ApiResponse<Vec<Order>>, AppError> {
    let page = Page { limit: page.limit(20), offset: page.offset() };
    let orders = OrderRepository::new(&state.db).list_for_user(auth.user_id, page).await?;
    Ok(ApiResponse::ok("Orders fetched successfully", orders))
}

async fn get_order(State(state): State<AppState>, auth: AuthUser, Path(id): Path<Uuid>) -> Result<ApiResponse<Order>, AppError> {
    let order = OrderRepository::new(&state.db).get(id, auth.into()).await?;
    Ok(ApiResponse::ok("Order fetched successfully", order))
}

async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Validated(req): Validated<StatusRequest>,
) -> Result<ApiResponse<Order>, AppError> {
    let mut order = OrderRepository::new(&state.db).transition(id, req.status, auth.into()).await?;
    state.events.publish(order.take_events()).await;
    Ok(ApiResponse::ok("Order status updated successfully", order))
}

async fn review_order(
    State(state): State<AppState>,
    auth: Authorized<UserRole>,
    Path(id): Path<Uuid>,
    Validated(req): Validated<ReviewRequest>,
) -> Result<(StatusCode, ApiResponse<ReviewCreated>), AppError> {
    let review_id = OrderRepository::new(&state.db)
        .review(id, auth.user_id, req.rating, req.comment.as_deref())
        .await?;
    Ok(ApiResponse::created("Review submitted successfully", ReviewCreated { review_id }))
}
