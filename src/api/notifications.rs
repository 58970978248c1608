use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{owned_store, seller_of};
use crate::auth::{Authorized, SellerRole};
use crate::db::notifications::{DashboardNotification, NewNotification, NotificationFilter};
use crate::db::{NotificationRepository, StoreRepository};
use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::Validated;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).post(create_notification))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub store_id: Option<Uuid>,
    pub is_read: Option<bool>,
    pub is_urgent: Option<bool>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<DashboardNotification>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    pub store_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 2000, message = "Message is required"))]
    pub message: String,
    #[validate(length(min = 1, max = 50))]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub is_urgent: bool,
    #[validate(length(max = 500))]
    pub action_url: Option<String>,
    #[validate(length(max = 100))]
    pub action_text: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ReadAllParams {
    pub store_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

async fn list_notifications(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Query(params): Query<NotificationParams>,
) -> Result<ApiResponse<NotificationList>, AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let repo = NotificationRepository::new(&state.db);
    let filter = NotificationFilter {
        store_id: params.store_id,
        is_read: params.is_read,
        is_urgent: params.is_urgent,
        notification_type: params.notification_type.as_deref(),
        limit: params.limit.unwrap_or(20).clamp(1, 100),
    };
    let notifications = repo.list(seller.id, &filter).await?;
    let unread_count = repo.unread_count(seller.id).await?;
    Ok(ApiResponse::ok("Notifications fetched successfully", NotificationList { notifications, unread_count }))
}

/// Without a `store_id` the notification is attached to the seller's oldest store.
async fn create_notification(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Validated(req): Validated<CreateNotificationRequest>,
) -> Result<(StatusCode, ApiResponse<DashboardNotification>), AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let store_id = match req.store_id {
        Some(id) => owned_store(&state, &auth, id).await?.id,
        None => StoreRepository::new(&state.db)
            .list_for_seller(seller.id)
            .await?
            .first()
            .map(|s| s.id)
            .ok_or_else(|| AppError::BadRequest("Create a store before adding notifications".to_string()))?,
    };
    let notification = NotificationRepository::new(&state.db)
        .create(NewNotification {
            seller_id: seller.id,
            store_id,
            title: &req.title,
            message: &req.message,
            notification_type: req.notification_type.as_deref().unwrap_or("GENERAL"),
            is_urgent: req.is_urgent,
            action_url: req.action_url.as_deref(),
            action_text: req.action_text.as_deref(),
            expires_at: req.expires_at,
        })
        .await?;
    Ok(ApiResponse::created("Notification created successfully", notification))
}

async fn mark_read(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<DashboardNotification>, AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let notification = NotificationRepository::new(&state.db).mark_read(id, seller.id).await?;
    Ok(ApiResponse::ok("Notification marked as read", notification))
}

async fn mark_all_read(
    State(state): State<AppState>,
    auth: Authorized<SellerRole>,
    Query(params): Query<ReadAllParams>,
) -> Result<ApiResponse<MarkedRead>, AppError> {
    let seller = seller_of(&state, auth.user_id).await?;
    let updated = NotificationRepository::new(&state.db).mark_all_read(seller.id, params.store_id).await?;
    Ok(ApiResponse::ok("All notifications marked as read", MarkedRead { updated }))
}
