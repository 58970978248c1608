//! Seller dashboard: store hours, inventory alerts, reviews, action logs and
//! sales analytics. Every endpoint is scoped to a store the caller owns.

use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::Router;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{owned_store, seller_of};
use crate::auth::{Authorized, SellerRole};
use crate::db::dashboard::{
    ActionCount, ActionFilter, ActionLog, AlertFilter, AlertSummary, DailySales, DayHours, InventoryAlert, NewAction, NewAlert,
    ReviewFilter, ReviewStatistics, SalesSummary, StoreHours, StoreReview,
};
use crate::db::DashboardRepository;
use crate::domain::aggregates::{AlertPriority, AlertType};
use crate::error::{AppError, FieldError};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/store-hours/:store_id", get(get_store_hours).put(set_store_hours))
        .route("/alerts", post(create_alert))
        .route("/alerts/:id", get(list_alerts))
        .route("/alerts/:id/resolve", put(resolve_alert))
        .route("/reviews/:id", get(list_reviews))
        .route("/reviews/:id/feature", put(feature_review))
        .route("/actions/log", post(log_action))
        .route("/actions/logs", get(list_actions))
        .route("/analytics/:store_id", get(analytics))
}

// ---- store hours ------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct StoreHoursRequest {
    #[validate]
    pub hours: Vec<DayHours>,
}

impl StoreHoursRequest {
    /// Field errors for open days without a valid time window and for repeated days.
    fn schedule_errors(&self) -> Vec<FieldError> {
        let mut seen = HashSet::new();
        let mut errors = Vec::new();
        if self.hours.is_empty() || self.hours.len() > 7 {
            errors.push(FieldError {
                field: "hours".to_string(),
                message: "Provide between 1 and 7 days".to_string(),
                code: "length".to_string(),
            });
        }
        for (i, day) in self.hours.iter().enumerate() {
            if !seen.insert(day.day_of_week) {
                errors.push(FieldError {
                    field: format!("hours[{i}].day_of_week"),
                    message: format!("day {} appears more than once", day.day_of_week),
                    code: "duplicate".to_string(),
                });
            }
            if !day.is_consistent() {
                errors.push(FieldError {
                    field: format!("hours[{i}]"),
                    message: "open days need open_time before close_time".to_string(),
                    code: "invalid_hours".to_string(),
                });
            }
        }
        errors
    }
}

async fn get_store_hours(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<StoreHours>>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let hours = DashboardRepository::new(&state.db).store_hours(store.id).await?;
    Ok(ApiResponse::ok("Store hours fetched successfully", hours))
}

async fn set_store_hours(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
    Validated(req): Validated<StoreHoursRequest>,
) -> Result<ApiResponse<Vec<StoreHours>>, AppError> {
    let errors = req.schedule_errors();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let store = owned_store(&state, &auth, store_id).await?;
    let hours = DashboardRepository::new(&state.db).set_store_hours(store.id, &req.hours).await?;
    Ok(ApiResponse::ok("Store hours updated successfully", hours))
}

// ---- alerts -----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AlertParams {
    pub is_resolved: Option<bool>,
    pub priority: Option<AlertPriority>,
    pub alert_type: Option<AlertType>,
}

#[derive(Debug, Serialize)]
pub struct AlertList {
    pub alerts: Vec<InventoryAlert>,
    pub summary: AlertSummary,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAlertRequest {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub alert_type: AlertType,
    #[validate(range(min = 0))]
    pub threshold_value: i32,
    #[validate(length(min = 1, max = 500))]
    pub message: Option<String>,
    pub priority: Option<AlertPriority>,
}

async fn list_alerts(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
    Query(params): Query<AlertParams>,
) -> Result<ApiResponse<AlertList>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let filter = AlertFilter { is_resolved: params.is_resolved, priority: params.priority, alert_type: params.alert_type };
    let alerts = DashboardRepository::new(&state.db).alerts(store.id, filter).await?;
    let summary = AlertSummary::from_alerts(&alerts);
    Ok(ApiResponse::ok("Inventory alerts fetched successfully", AlertList { alerts, summary }))
}

async fn create_alert(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Validated(req): Validated<CreateAlertRequest>,
) -> Result<(StatusCode, ApiResponse<InventoryAlert>), AppError> {
    let store = owned_store(&state, &auth, req.store_id).await?;
    let alert = DashboardRepository::new(&state.db)
        .create_alert(NewAlert {
            store_id: store.id,
            product_id: req.product_id,
            alert_type: req.alert_type,
            threshold_value: req.threshold_value,
            message: req.message.as_deref(),
            priority: req.priority.unwrap_or(AlertPriority::Medium),
        })
        .await?;
    Ok(ApiResponse::created("Inventory alert created successfully", alert))
}

async fn resolve_alert(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<InventoryAlert>, AppError> {
    let dashboard = DashboardRepository::new(&state.db);
    let alert = dashboard.alert(id).await?;
    owned_store(&state, &auth, alert.store_id).await?;
    let alert = dashboard.resolve_alert(id).await?;
    Ok(ApiResponse::ok("Inventory alert resolved", alert))
}

// ---- reviews ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReviewParams {
    pub rating: Option<i16>,
    pub is_verified: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReviewList {
    pub reviews: Vec<StoreReview>,
    pub statistics: ReviewStatistics,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeatureRequest {
    pub is_featured: Option<bool>,
}

async fn list_reviews(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
    Query(params): Query<ReviewParams>,
) -> Result<ApiResponse<ReviewList>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let dashboard = DashboardRepository::new(&state.db);
    let filter = ReviewFilter {
        rating: params.rating,
        is_verified: params.is_verified,
        limit: params.limit.unwrap_or(20).clamp(1, 100),
        offset: params.offset.unwrap_or(0).max(0),
    };
    let reviews = dashboard.reviews(store.id, filter).await?;
    let statistics = dashboard.review_statistics(store.id).await?;
    Ok(ApiResponse::ok("Store reviews fetched successfully", ReviewList { reviews, statistics }))
}

async fn feature_review(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(id): Path<Uuid>,
    Validated(req): Validated<FeatureRequest>,
) -> Result<ApiResponse<StoreReview>, AppError> {
    let dashboard = DashboardRepository::new(&state.db);
    let review = dashboard.review(id).await?;
    owned_store(&state, &auth, review.store_id).await?;
    let review = dashboard.set_featured(id, req.is_featured.unwrap_or(true)).await?;
    Ok(ApiResponse::ok("Review updated successfully", review))
}

// ---- action logs ------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct LogActionRequest {
    pub store_id: Option<Uuid>,
    #[validate(length(min = 1, max = 50, message = "action_type is required"))]
    pub action_type: String,
    #[validate(length(min = 1, max = 500, message = "description is required"))]
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ActionParams {
    pub store_id: Option<Uuid>,
    pub action_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ActionList {
    pub logs: Vec<ActionLog>,
    pub breakdown: Vec<ActionCount>,
}

async fn log_action(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    headers: HeaderMap,
    Validated(req): Validated<LogActionRequest>,
) -> Result<(StatusCode, ApiResponse<ActionLog>), AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    if let Some(store_id) = req.store_id {
        owned_store(&state, &auth, store_id).await?;
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let ip_address = header("x-forwarded-for").and_then(|v| v.split(',').next()).map(str::trim);

    let log = DashboardRepository::new(&state.db)
        .log_action(NewAction {
            seller_id: seller.id,
            store_id: req.store_id,
            action_type: &req.action_type,
            description: &req.description,
            metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
            ip_address,
            user_agent: header("user-agent"),
        })
        .await?;
    Ok(ApiResponse::created("Action logged successfully", log))
}

async fn list_actions(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Query(params): Query<ActionParams>,
) -> Result<ApiResponse<ActionList>, AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let dashboard = DashboardRepository::new(&state.db);
    let filter = ActionFilter {
        store_id: params.store_id,
        action_type: params.action_type.as_deref(),
        start: params.start_date,
        end: params.end_date,
        limit: params.limit.unwrap_or(50).clamp(1, 100),
    };
    let logs = dashboard.action_logs(seller.id, &filter).await?;
    let breakdown = dashboard.action_breakdown(seller.id, params.store_id).await?;
    Ok(ApiResponse::ok("Action logs fetched successfully", ActionList { logs, breakdown }))
}

// ---- analytics --------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct Analytics {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub daily: Vec<DailySales>,
    pub summary: SalesSummary,
}

/// Inclusive `from..=to` plus the exclusive day after `to` used as the query bound.
#[derive(Debug, PartialEq, Eq)]
struct AnalyticsWindow {
    from: NaiveDate,
    to: NaiveDate,
    end: NaiveDate,
}

/// Defaults to the 30 days ending today.
fn analytics_window(params: &AnalyticsParams, today: NaiveDate) -> Result<AnalyticsWindow, AppError> {
    let out_of_range = || AppError::BadRequest("Date range is out of bounds".to_string());
    let to = params.to.unwrap_or(today);
    let from = match params.from {
        Some(from) => from,
        None => to.checked_sub_signed(Duration::days(29)).ok_or_else(out_of_range)?,
    };
    if from > to {
        return Err(AppError::BadRequest("from must not be after to".to_string()));
    }
    let end = to.succ_opt().ok_or_else(out_of_range)?;
    Ok(AnalyticsWindow { from, to, end })
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::default()))
}

async fn analytics(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(store_id): Path<Uuid>,
    Query(params): Query<AnalyticsParams>,
) -> Result<ApiResponse<Analytics>, AppError> {
    let store = owned_store(&state, &auth, store_id).await?;
    let window = analytics_window(&params, Utc::now().date_naive())?;
    let daily = DashboardRepository::new(&state.db)
        .daily_sales(store.id, start_of(window.from), start_of(window.end))
        .await?;
    let summary = SalesSummary::from_days(&daily);
    Ok(ApiResponse::ok(
        "Analytics fetched successfully",
        Analytics { from: window.from, to: window.to, daily, summary },
    ))
}
