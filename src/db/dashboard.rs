//! Seller dashboard read models: store hours, inventory alerts, reviews,
//! action logs and sales analytics.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::RepositoryError;
use crate::domain::aggregates::{AlertPriority, AlertType, StockAlert};
use crate::domain::value_objects::Money;

// =============================================================================
// Store hours
// =============================================================================

/// Days are numbered from Sunday = 0.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreHours {
    pub id: Uuid,
    pub store_id: Uuid,
    pub day_of_week: i16,
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    pub is_closed: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DayHours {
    #[validate(range(min = 0, max = 6, message = "day_of_week must be between 0 (Sunday) and 6"))]
    pub day_of_week: i16,
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    #[serde(default)]
    pub is_closed: bool,
}

impl DayHours {
    /// An open day needs both times, opening before closing.
    pub fn is_consistent(&self) -> bool {
        if self.is_closed {
            return true;
        }
        matches!((self.open_time, self.close_time), (Some(open), Some(close)) if open < close)
    }
}

/// 09:00 to 21:00 every day, closed on Sunday.
pub fn default_hours(store_id: Uuid) -> Vec<StoreHours> {
    let open = NaiveTime::from_hms_opt(9, 0, 0);
    let close = NaiveTime::from_hms_opt(21, 0, 0);
    (0..7)
        .map(|day| {
            let sunday = day == 0;
            StoreHours {
                id: Uuid::now_v7(),
                store_id,
                day_of_week: day,
                open_time: if sunday { None } else { open },
                close_time: if sunday { None } else { close },
                is_closed: sunday,
            }
        })
        .collect()
}

// =============================================================================
// Inventory alerts
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryAlert {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_stock: i32,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub threshold_value: i32,
    pub current_value: i32,
    pub message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AlertFilter {
    pub is_resolved: Option<bool>,
    pub priority: Option<AlertPriority>,
    pub alert_type: Option<AlertType>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub unresolved: usize,
    pub critical: usize,
    pub high: usize,
}

impl AlertSummary {
    /// Critical and high counts only include unresolved alerts.
    pub fn from_alerts(alerts: &[InventoryAlert]) -> Self {
        alerts.iter().fold(Self { total: alerts.len(), ..Self::default() }, |mut s, a| {
            if !a.is_resolved {
                s.unresolved += 1;
                match a.priority {
                    AlertPriority::Critical => s.critical += 1,
                    AlertPriority::High => s.high += 1,
                    AlertPriority::Medium | AlertPriority::Low => {}
                }
            }
            s
        })
    }
}

pub struct NewAlert<'a> {
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub alert_type: AlertType,
    pub threshold_value: i32,
    pub message: Option<&'a str>,
    pub priority: AlertPriority,
}

const ALERT_SELECT: &str = "SELECT a.id, a.store_id, a.product_id, p.name AS product_name, p.stock AS product_stock,
        a.alert_type, a.priority, a.threshold_value, a.current_value, a.message, a.is_resolved, a.resolved_at, a.created_at
     FROM inventory_alerts a JOIN products p ON p.id = a.product_id";

// =============================================================================
// Reviews
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreReview {
    pub id: Uuid,
    pub store_id: Uuid,
    pub user_id: Uuid,
    pub reviewer_name: String,
    pub order_id: Uuid,
    pub order_total: Money,
    pub rating: i16,
    pub comment: Option<String>,
    pub is_featured: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReviewFilter {
    pub rating: Option<i16>,
    pub is_verified: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RatingCount {
    pub rating: i16,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewStatistics {
    pub total_reviews: i64,
    pub average_rating: f64,
    pub rating_breakdown: Vec<RatingCount>,
}

const REVIEW_SELECT: &str = "SELECT r.id, r.store_id, r.user_id, u.name AS reviewer_name, r.order_id, o.total_amount AS order_total,
        r.rating, r.comment, r.is_featured, r.is_verified, r.created_at
     FROM store_reviews r JOIN users u ON u.id = r.user_id JOIN orders o ON o.id = r.order_id";

// =============================================================================
// Action logs
// =============================================================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActionLog {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub store_id: Option<Uuid>,
    pub action_type: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewAction<'a> {
    pub seller_id: Uuid,
    pub store_id: Option<Uuid>,
    pub action_type: &'a str,
    pub description: &'a str,
    pub metadata: serde_json::Value,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ActionFilter<'a> {
    pub store_id: Option<Uuid>,
    pub action_type: Option<&'a str>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActionCount {
    pub action_type: String,
    pub count: i64,
}

// =============================================================================
// Analytics
// =============================================================================

/// One day of accepted and delivered sales for a store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub sales_amount: Money,
    pub order_count: i64,
    pub average_order_value: Money,
    pub unique_customers: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub total_sales: Money,
    pub total_orders: i64,
    pub average_order_value: Money,
}

impl SalesSummary {
    pub fn from_days(days: &[DailySales]) -> Self {
        let total_sales: Money = days.iter().map(|d| d.sales_amount).sum();
        let total_orders: i64 = days.iter().map(|d| d.order_count).sum();
        let average_order_value = if total_orders == 0 {
            Money::ZERO
        } else {
            Money::new(total_sales.amount() / Decimal::from(total_orders)).round_cents()
        };
        Self { total_sales, total_orders, average_order_value }
    }
}

// =============================================================================
// Repository
// =============================================================================

pub struct DashboardRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DashboardRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stored hours for the store. The defaults are written on first read.
    pub async fn store_hours(&self, store_id: Uuid) -> Result<Vec<StoreHours>, RepositoryError> {
        let hours = self.fetch_hours(store_id).await?;
        if !hours.is_empty() {
            return Ok(hours);
        }
        let mut tx = self.pool.begin().await?;
        for day in default_hours(store_id) {
            upsert_day(&mut tx, store_id, day.day_of_week, day.open_time, day.close_time, day.is_closed, false).await?;
        }
        tx.commit().await?;
        self.fetch_hours(store_id).await
    }

    pub async fn set_store_hours(&self, store_id: Uuid, days: &[DayHours]) -> Result<Vec<StoreHours>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for d in days {
            let (open, close) = if d.is_closed { (None, None) } else { (d.open_time, d.close_time) };
            upsert_day(&mut tx, store_id, d.day_of_week, open, close, d.is_closed, true).await?;
        }
        tx.commit().await?;
        self.fetch_hours(store_id).await
    }

    async fn fetch_hours(&self, store_id: Uuid) -> Result<Vec<StoreHours>, RepositoryError> {
        let hours = sqlx::query_as::<_, StoreHours>("SELECT * FROM store_hours WHERE store_id = $1 ORDER BY day_of_week")
            .bind(store_id)
            .fetch_all(self.pool)
            .await?;
        Ok(hours)
    }

    /// Alerts for a store, most urgent and newest first.
    pub async fn alerts(&self, store_id: Uuid, filter: AlertFilter) -> Result<Vec<InventoryAlert>, RepositoryError> {
        let sql = format!(
            "{ALERT_SELECT}
             WHERE a.store_id = $1 AND ($2::bool IS NULL OR a.is_resolved = $2)
               AND ($3::alert_priority IS NULL OR a.priority = $3) AND ($4::alert_type IS NULL OR a.alert_type = $4)
             ORDER BY a.priority DESC, a.created_at DESC"
        );
        let alerts = sqlx::query_as::<_, InventoryAlert>(&sql)
            .bind(store_id)
            .bind(filter.is_resolved)
            .bind(filter.priority)
            .bind(filter.alert_type)
            .fetch_all(self.pool)
            .await?;
        Ok(alerts)
    }

    pub async fn alert(&self, id: Uuid) -> Result<InventoryAlert, RepositoryError> {
        sqlx::query_as::<_, InventoryAlert>(&format!("{ALERT_SELECT} WHERE a.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("Alert"))
    }

    /// Creates an alert with the product's current stock as `current_value`.
    pub async fn create_alert(&self, new: NewAlert<'_>) -> Result<InventoryAlert, RepositoryError> {
        let stock: Option<(i32, String)> = sqlx::query_as("SELECT stock, name FROM products WHERE id = $1 AND store_id = $2")
            .bind(new.product_id)
            .bind(new.store_id)
            .fetch_optional(self.pool)
            .await?;
        let (current, name) = stock.ok_or(RepositoryError::NotFound("Product"))?;
        let message = new.message.map_or_else(|| format!("{name}: stock at {current}, threshold {}", new.threshold_value), str::to_string);

        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO inventory_alerts (id, store_id, product_id, alert_type, priority, threshold_value, current_value, message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(new.store_id)
        .bind(new.product_id)
        .bind(new.alert_type)
        .bind(new.priority)
        .bind(new.threshold_value)
        .bind(current)
        .bind(&message)
        .execute(self.pool)
        .await?;
        self.alert(id).await
    }

    pub async fn resolve_alert(&self, id: Uuid) -> Result<InventoryAlert, RepositoryError> {
        let result = sqlx::query("UPDATE inventory_alerts SET is_resolved = TRUE, resolved_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("Alert"));
        }
        self.alert(id).await
    }

    pub async fn reviews(&self, store_id: Uuid, filter: ReviewFilter) -> Result<Vec<StoreReview>, RepositoryError> {
        let sql = format!(
            "{REVIEW_SELECT}
             WHERE r.store_id = $1 AND ($2::smallint IS NULL OR r.rating = $2) AND ($3::bool IS NULL OR r.is_verified = $3)
             ORDER BY r.created_at DESC LIMIT $4 OFFSET $5"
        );
        let reviews = sqlx::query_as::<_, StoreReview>(&sql)
            .bind(store_id)
            .bind(filter.rating)
            .bind(filter.is_verified)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(self.pool)
            .await?;
        Ok(reviews)
    }

    /// Statistics over every review of the store, ignoring list filters.
    pub async fn review_statistics(&self, store_id: Uuid) -> Result<ReviewStatistics, RepositoryError> {
        let (total_reviews, average_rating): (i64, f64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(AVG(rating)::float8, 0) FROM store_reviews WHERE store_id = $1")
                .bind(store_id)
                .fetch_one(self.pool)
                .await?;
        let rating_breakdown = sqlx::query_as::<_, RatingCount>(
            "SELECT rating, COUNT(*) AS count FROM store_reviews WHERE store_id = $1 GROUP BY rating ORDER BY rating DESC",
        )
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ReviewStatistics { total_reviews, average_rating, rating_breakdown })
    }

    pub async fn review(&self, id: Uuid) -> Result<StoreReview, RepositoryError> {
        sqlx::query_as::<_, StoreReview>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("Review"))
    }

    pub async fn set_featured(&self, id: Uuid, featured: bool) -> Result<StoreReview, RepositoryError> {
        let result = sqlx::query("UPDATE store_reviews SET is_featured = $2 WHERE id = $1")
            .bind(id)
            .bind(featured)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("Review"));
        }
        self.review(id).await
    }

    pub async fn log_action(&self, new: NewAction<'_>) -> Result<ActionLog, RepositoryError> {
        let log = sqlx::query_as::<_, ActionLog>(
            "INSERT INTO dashboard_action_logs (id, seller_id, store_id, action_type, description, metadata, ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(new.seller_id)
        .bind(new.store_id)
        .bind(new.action_type)
        .bind(new.description)
        .bind(&new.metadata)
        .bind(new.ip_address)
        .bind(new.user_agent)
        .fetch_one(self.pool)
        .await?;
        Ok(log)
    }

    pub async fn action_logs(&self, seller_id: Uuid, filter: &ActionFilter<'_>) -> Result<Vec<ActionLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, ActionLog>(
            "SELECT * FROM dashboard_action_logs
             WHERE seller_id = $1 AND ($2::uuid IS NULL OR store_id = $2) AND ($3::text IS NULL OR action_type = $3)
               AND ($4::timestamptz IS NULL OR created_at >= $4) AND ($5::timestamptz IS NULL OR created_at <= $5)
             ORDER BY created_at DESC LIMIT $6",
        )
        .bind(seller_id)
        .bind(filter.store_id)
        .bind(filter.action_type)
        .bind(filter.start)
        .bind(filter.end)
        .bind(filter.limit)
        .fetch_all(self.pool)
        .await?;
        Ok(logs)
    }

    /// Per-type counts over all of the seller's logs (optionally one store).
    pub async fn action_breakdown(&self, seller_id: Uuid, store_id: Option<Uuid>) -> Result<Vec<ActionCount>, RepositoryError> {
        let counts = sqlx::query_as::<_, ActionCount>(
            "SELECT action_type, COUNT(*) AS count FROM dashboard_action_logs
             WHERE seller_id = $1 AND ($2::uuid IS NULL OR store_id = $2)
             GROUP BY action_type ORDER BY count DESC, action_type",
        )
        .bind(seller_id)
        .bind(store_id)
        .fetch_all(self.pool)
        .await?;
        Ok(counts)
    }

    /// Daily rollup of accepted and delivered orders placed in `[from, to)`.
    pub async fn daily_sales(&self, store_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<DailySales>, RepositoryError> {
        let days = sqlx::query_as::<_, DailySales>(
            "SELECT (placed_at AT TIME ZONE 'UTC')::date AS day,
                    SUM(total_amount) AS sales_amount,
                    COUNT(*) AS order_count,
                    ROUND(AVG(total_amount), 2) AS average_order_value,
                    COUNT(DISTINCT user_id) AS unique_customers
             FROM orders
             WHERE store_id = $1 AND status IN ('ACCEPTED', 'DELIVERED') AND placed_at >= $2 AND placed_at < $3
             GROUP BY 1 ORDER BY 1",
        )
        .bind(store_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;
        Ok(days)
    }
}

async fn upsert_day(
    conn: &mut PgConnection,
    store_id: Uuid,
    day: i16,
    open: Option<NaiveTime>,
    close: Option<NaiveTime>,
    closed: bool,
    overwrite: bool,
) -> Result<(), RepositoryError> {
    let conflict = if overwrite {
        "DO UPDATE SET open_time = EXCLUDED.open_time, close_time = EXCLUDED.close_time, is_closed = EXCLUDED.is_closed"
    } else {
        "DO NOTHING"
    };
    sqlx::query(&format!(
        "INSERT INTO store_hours (id, store_id, day_of_week, open_time, close_time, is_closed) VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (store_id, day_of_week) {conflict}"
    ))
    .bind(Uuid::now_v7())
    .bind(store_id)
    .bind(day)
    .bind(open)
    .bind(close)
    .bind(closed)
    .execute(conn)
    .await?;
    Ok(())
}

/// Records a stock alert raised by a sale, unless the product already has an
/// unresolved alert of the same type.
pub(crate) async fn raise_stock_alert(conn: &mut PgConnection, store_id: Uuid, product_id: Uuid, alert: &StockAlert) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO inventory_alerts (id, store_id, product_id, alert_type, priority, threshold_value, current_value, message)
         SELECT $1, $2, $3, $4, $5, $6, $7, $8
         WHERE NOT EXISTS (
             SELECT 1 FROM inventory_alerts WHERE product_id = $3 AND alert_type = $4 AND NOT is_resolved
         )",
    )
    .bind(Uuid::now_v7())
    .bind(store_id)
    .bind(product_id)
    .bind(alert.alert_type)
    .bind(alert.priority)
    .bind(alert.threshold)
    .bind(alert.current)
    .bind(&alert.message)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Records a verified review for a delivered order.
pub(crate) async fn insert_review(
    conn: &mut PgConnection,
    store_id: Uuid,
    user_id: Uuid,
    order_id: Uuid,
    rating: i16,
    comment: Option<&str>,
) -> Result<Uuid, RepositoryError> {
    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO store_reviews (id, store_id, user_id, order_id, rating, comment, is_verified) VALUES ($1, $2, $3, $4, $5, $6, TRUE)",
    )
    .bind(id)
    .bind(store_id)
    .bind(user_id)
    .bind(order_id)
    .bind(rating)
    .bind(comment)
    .execute(conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "Order has already been reviewed"))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(priority: AlertPriority, resolved: bool) -> InventoryAlert {
        InventoryAlert {
            id: Uuid::now_v7(),
            store_id: Uuid::nil(),
            product_id: Uuid::nil(),
            product_name: "Wireless Headphones".into(),
            product_stock: 3,
            alert_type: AlertType::LowStock,
            priority,
            threshold_value: 10,
            current_value: 3,
            message: String::new(),
            is_resolved: resolved,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_hours() {
        let hours = default_hours(Uuid::nil());
        assert_eq!(hours.len(), 7);
        assert!(hours[0].is_closed && hours[0].open_time.is_none());
        assert_eq!(hours[3].open_time, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(hours[6].close_time, NaiveTime::from_hms_opt(21, 0, 0));
        assert!(hours[1..].iter().all(|h| !h.is_closed));
    }

    #[test]
    fn test_day_hours_consistency() {
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0);
        assert!(DayHours { day_of_week: 1, open_time: t(9), close_time: t(17), is_closed: false }.is_consistent());
        assert!(!DayHours { day_of_week: 1, open_time: t(17), close_time: t(9), is_closed: false }.is_consistent());
        assert!(!DayHours { day_of_week: 1, open_time: None, close_time: t(9), is_closed: false }.is_consistent());
        assert!(DayHours { day_of_week: 0, open_time: None, close_time: None, is_closed: true }.is_consistent());
        assert!(DayHours { day_of_week: 7, open_time: None, close_time: None, is_closed: true }.validate().is_err());
    }

    #[test]
    fn test_alert_summary_counts_unresolved_only() {
        let alerts = vec![
            alert(AlertPriority::Critical, false),
            alert(AlertPriority::Critical, true),
            alert(AlertPriority::High, false),
            alert(AlertPriority::Medium, false),
        ];
        assert_eq!(AlertSummary::from_alerts(&alerts), AlertSummary { total: 4, unresolved: 3, critical: 1, high: 1 });
        assert_eq!(AlertSummary::from_alerts(&[]), AlertSummary::default());
    }

    #[test]
    fn test_sales_summary() {
        let day = |d, cents, n| DailySales {
            day: NaiveDate::from_ymd_opt(2024, 6, d).unwrap_or_default(),
            sales_amount: Money::from_cents(cents),
            order_count: n,
            average_order_value: Money::ZERO,
            unique_customers: n,
        };
        let summary = SalesSummary::from_days(&[day(1, 29_900, 1), day(2, 44_700, 2)]);
        assert_eq!(summary.total_sales, Money::from_cents(74_600));
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.average_order_value, Money::from_cents(24_867));
        assert_eq!(SalesSummary::from_days(&[]).average_order_value, Money::ZERO);
    }
}
