//! Marketplace Commerce
//!
//! Multi-store marketplace backend.
//!
//! ## Features
//! - Users, sellers and stores with role-based access
//! - Per-store carts and transactional checkout
//! - Order lifecycle, reviews and low-stock alerts
//! - Seller settlements with exact per-order allocation
//! - Seller dashboard: store hours, notifications, action logs, sales analytics

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod response;
pub mod state;
pub mod validation;

pub use app::build_router;
pub use config::Config;
pub use error::AppError;
pub use state::AppState;
