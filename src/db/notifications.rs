//! Seller dashboard notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::RepositoryError;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DashboardNotification {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub store_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub is_urgent: bool,
    pub is_read: bool,
    pub action_url: Option<String>,
    pub action_text: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationFilter<'a> {
    pub store_id: Option<Uuid>,
    pub is_read: Option<bool>,
    pub is_urgent: Option<bool>,
    pub notification_type: Option<&'a str>,
    pub limit: i64,
}

pub struct NewNotification<'a> {
    pub seller_id: Uuid,
    pub store_id: Uuid,
    pub title: &'a str,
    pub message: &'a str,
    pub notification_type: &'a str,
    pub is_urgent: bool,
    pub action_url: Option<&'a str>,
    pub action_text: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Unexpired notifications, urgent first then newest.
    pub async fn list(&self, seller_id: Uuid, filter: &NotificationFilter<'_>) -> Result<Vec<DashboardNotification>, RepositoryError> {
        let notifications = sqlx::query_as::<_, DashboardNotification>(
            "SELECT * FROM dashboard_notifications
             WHERE seller_id = $1 AND (expires_at IS NULL OR expires_at > NOW())
               AND ($2::uuid IS NULL OR store_id = $2) AND ($3::bool IS NULL OR is_read = $3)
               AND ($4::bool IS NULL OR is_urgent = $4) AND ($5::text IS NULL OR notification_type = $5)
             ORDER BY is_urgent DESC, created_at DESC LIMIT $6",
        )
        .bind(seller_id)
        .bind(filter.store_id)
        .bind(filter.is_read)
        .bind(filter.is_urgent)
        .bind(filter.notification_type)
        .bind(filter.limit)
        .fetch_all(self.pool)
        .await?;
        Ok(notifications)
    }

    pub async fn unread_count(&self, seller_id: Uuid) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM dashboard_notifications WHERE seller_id = $1 AND NOT is_read AND (expires_at IS NULL OR expires_at > NOW())",
        )
        .bind(seller_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    pub async fn create(&self, new: NewNotification<'_>) -> Result<DashboardNotification, RepositoryError> {
        let notification = sqlx::query_as::<_, DashboardNotification>(
            "INSERT INTO dashboard_notifications
                (id, seller_id, store_id, title, message, notification_type, is_urgent, action_url, action_text, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.seller_id)
        .bind(new.store_id)
        .bind(new.title)
        .bind(new.message)
        .bind(new.notification_type)
        .bind(new.is_urgent)
        .bind(new.action_url)
        .bind(new.action_text)
        .bind(new.expires_at)
        .fetch_one(self.pool)
        .await?;
        Ok(notification)
    }

    pub async fn mark_read(&self, id: Uuid, seller_id: Uuid) -> Result<DashboardNotification, RepositoryError> {
        sqlx::query_as::<_, DashboardNotification>(
            "UPDATE dashboard_notifications SET is_read = TRUE WHERE id = $1 AND seller_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(seller_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound("Notification"))
    }

    /// Marks every unread notification read and returns how many changed.
    pub async fn mark_all_read(&self, seller_id: Uuid, store_id: Option<Uuid>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE dashboard_notifications SET is_read = TRUE WHERE seller_id = $1 AND NOT is_read AND ($2::uuid IS NULL OR store_id = $2)",
        )
        .bind(seller_id)
        .bind(store_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Notifies whoever owns `store_id`.
pub(crate) async fn notify_store_owner(
    conn: &mut PgConnection,
    store_id: Uuid,
    title: &str,
    message: &str,
    notification_type: &str,
    is_urgent: bool,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO dashboard_notifications (id, seller_id, store_id, title, message, notification_type, is_urgent)
         SELECT $1, seller_id, id, $3, $4, $5, $6 FROM stores WHERE id = $2",
    )
    .bind(Uuid::now_v7())
    .bind(store_id)
    .bind(title)
    .bind(message)
    .bind(notification_type)
    .bind(is_urgent)
    .execute(conn)
    .await?;
    Ok(())
}
