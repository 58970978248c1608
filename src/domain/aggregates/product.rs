//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price: Money,
    pub stock: i32,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "alert_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType { LowStock, OutOfStock, Overstock }

/// Alert urgency. Variant order is the sort order used by dashboards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "alert_priority", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertPriority { Low, Medium, High, Critical }

/// What a stock level warrants after a sale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockAlert { pub alert_type: AlertType, pub priority: AlertPriority, pub threshold: i32, pub current: i32, pub message: String }

impl Product {
    pub fn has_stock_for(&self, qty: Quantity) -> bool { !qty.exceeds(self.stock) }

    /// Takes `qty` units out of stock. Stock never goes below zero.
    pub fn remove_inventory(&mut self, qty: Quantity) -> Result<(), ProductError> {
        if !self.has_stock_for(qty) {
            return Err(ProductError::InsufficientInventory { product_id: self.id, available: self.stock, requested: qty.value() });
        }
        self.stock -= qty.value();
        self.touch();
        Ok(())
    }

    pub fn set_stock(&mut self, stock: i32) -> Result<(), ProductError> {
        if stock < 0 { return Err(ProductError::NegativeStock(stock)); }
        self.stock = stock;
        self.touch();
        Ok(())
    }

    pub fn stock_alert(&self, threshold: i32) -> Option<StockAlert> {
        if self.stock == 0 {
            Some(StockAlert { alert_type: AlertType::OutOfStock, priority: AlertPriority::Critical, threshold, current: 0, message: format!("{} is out of stock", self.name) })
        } else if self.stock <= threshold {
            Some(StockAlert { alert_type: AlertType::LowStock, priority: AlertPriority::High, threshold, current: self.stock, message: format!("{} running low on stock ({} left)", self.name, self.stock) })
        } else {
            None
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError { InsufficientInventory { product_id: Uuid, available: i32, requested: i32 }, NegativeStock(i32) }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientInventory { product_id, available, requested } => write!(f, "Insufficient stock for product {product_id}: {available} available, {requested} requested"),
            Self::NegativeStock(v) => write!(f, "Stock cannot be negative (got {v})"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample(name: &str, price: i64, stock: i32, store_id: Uuid) -> Product {
    Product {
        id: Uuid::now_v7(), store_id, name: name.into(), category: None,
        price: Money::new(rust_decimal::Decimal::new(price, 0)), stock, images: vec![],
        created_at: Utc::now(), updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory() {
        let mut p = sample("Gaming Mouse", 79, 10, Uuid::now_v7());
        p.remove_inventory(Quantity::new(4).unwrap()).unwrap();
        assert_eq!(p.stock, 6);
        let err = p.remove_inventory(Quantity::new(7).unwrap()).unwrap_err();
        assert!(matches!(err, ProductError::InsufficientInventory { available: 6, requested: 7, .. }));
        assert_eq!(p.stock, 6);
        assert!(p.set_stock(-1).is_err());
    }

    #[test]
    fn test_stock_alerts() {
        let mut p = sample("Bluetooth Speaker", 149, 3, Uuid::now_v7());
        let alert = p.stock_alert(10).unwrap();
        assert_eq!((alert.alert_type, alert.priority, alert.current), (AlertType::LowStock, AlertPriority::High, 3));
        p.set_stock(0).unwrap();
        assert_eq!(p.stock_alert(10).unwrap().alert_type, AlertType::OutOfStock);
        p.set_stock(78).unwrap();
        assert!(p.stock_alert(10).is_none());
    }

    #[test]
    fn test_priority_order() {
        assert!(AlertPriority::Critical > AlertPriority::High);
        assert!(AlertPriority::Medium > AlertPriority::Low);
    }
}
