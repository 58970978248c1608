use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminRole, Authorized};
use crate::db::users::User;
use crate::db::{SettlementRepository, StoreRepository, UserRepository};
use crate::domain::aggregates::{PaymentMethod, Settlement, SettlementRequest};
use crate::domain::value_objects::Money;
use crate::error::AppError;
use crate::response::{ApiResponse, Pagination};
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/settlements", post(generate_settlement))
        .route("/settlements/:id/complete", put(complete_settlement))
        .route("/settlements/:id/fail", put(fail_settlement))
        .route("/users", get(list_users))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateSettlementRequest {
    pub store_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub other_deductions: Option<Money>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteSettlementRequest {
    #[validate(length(min = 1, max = 100))]
    pub transaction_reference: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FailSettlementRequest {
    #[validate(length(min = 1, max = 500, message = "A failure reason is required"))]
    pub reason: String,
}

async fn generate_settlement(
    State(state): State<AppState>,
    _admin: Authorized<AdminRole>,
    Validated(req): Validated<GenerateSettlementRequest>,
) -> Result<(StatusCode, ApiResponse<Settlement>), AppError> {
    let store = StoreRepository::new(&state.db).get(req.store_id).await?;
    let request = SettlementRequest {
        seller_id: store.seller_id,
        store_id: store.id,
        period_start: req.period_start,
        period_end: req.period_end,
        other_deductions: req.other_deductions.unwrap_or(Money::ZERO).round_cents(),
        payment_method: req.payment_method.unwrap_or(PaymentMethod::BankTransfer),
    };
    let mut settlement = SettlementRepository::new(&state.db)
        .generate(&request, state.config.settlement_rates())
        .await?;
    state.events.publish(settlement.take_events()).await;
    Ok(ApiResponse::created("Settlement generated successfully", settlement))
}

async fn complete_settlement(
    State(state): State<AppState>,
    _admin: Authorized<AdminRole>,
    Path(id): Path<Uuid>,
    Validated(req): Validated<CompleteSettlementRequest>,
) -> Result<ApiResponse<Settlement>, AppError> {
    let mut settlement = SettlementRepository::new(&state.db).complete(id, req.transaction_reference).await?;
    state.events.publish(settlement.take_events()).await;
    Ok(ApiResponse::ok("Settlement completed successfully", settlement))
}

async fn fail_settlement(
    State(state): State<AppState>,
    _admin: Authorized<AdminRole>,
    Path(id): Path<Uuid>,
    Validated(req): Validated<FailSettlementRequest>,
) -> Result<ApiResponse<Settlement>, AppError> {
    let mut settlement = SettlementRepository::new(&state.db).fail(id, req.reason).await?;
    state.events.publish(settlement.take_events()).await;
    Ok(ApiResponse::ok("Settlement marked as failed", settlement))
}

async fn list_users(
    State(state): State<AppState>,
    _admin: Authorized<AdminRole>,
    Query(page): Query<Pagination>,
) -> Result<ApiResponse<Vec<User>>, AppError> {
    let users = UserRepository::new(&state.db).list(page.limit(50), page.offset()).await?;
    Ok(ApiResponse::ok("Users fetched successfully", users))
}
