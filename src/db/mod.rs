//! Database access for the marketplace `PostgreSQL` schema.
//!
//! ## Tables
//!
//! - `users`, `sellers`, `stores` - Identity and store ownership
//! - `products` - Catalog with stock counts (`CHECK (stock >= 0)`)
//! - `carts`, `cart_lines` - One active cart per (user, store)
//! - `orders`, `order_items` - Checkout snapshots
//! - `settlements`, `settlement_details`, `seller_payments`, `seller_balances` - Payouts
//! - `store_hours`, `inventory_alerts`, `store_reviews`, `dashboard_notifications`,
//!   `dashboard_action_logs` - Seller dashboard
//! - `support_tickets`
//!
//! # Migrations
//!
//! Stored in `migrations/` and applied on start-up unless `RUN_MIGRATIONS=false`.

pub mod carts;
pub mod dashboard;
pub mod notifications;
pub mod orders;
pub mod products;
pub mod settlements;
pub mod stores;
pub mod support;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::Config;
use crate::domain::aggregates::{CartError, OrderError, ProductError, SettlementError};

pub use carts::CartRepository;
pub use dashboard::DashboardRepository;
pub use notifications::NotificationRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use settlements::SettlementRepository;
pub use stores::StoreRepository;
pub use support::SupportRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),

    /// The caller does not own the addressed row.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),
}

impl RepositoryError {
    /// Maps a unique-constraint violation to `Conflict`, passing other errors through.
    pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(message.to_string()),
            _ => Self::Database(e),
        }
    }
}

/// Create a `PostgreSQL` connection pool sized from configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(config.database_url.expose_secret())
        .await
}
