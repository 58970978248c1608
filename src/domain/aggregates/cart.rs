//! Cart Aggregate
//!
//! One active cart per (user, store). Every mutation re-derives `total_amount`
//! from the current lines, so the stored total can never drift from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "cart_status", rename_all = "snake_case")]
pub enum CartStatus { Active, CheckedOut }

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub status: CartStatus,
    pub total_amount: Money,
    #[sqlx(skip)]
    pub lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct CartLine {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub price_at_time: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.price_at_time.times(self.quantity) }
}

impl Cart {
    pub fn open(user_id: Uuid, store_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), user_id, store_id, status: CartStatus::Active,
            total_amount: Money::ZERO, lines: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, line_id: Uuid) -> Option<&CartLine> { self.lines.iter().find(|l| l.id == line_id) }

    pub fn ensure_owner(&self, user_id: Uuid) -> Result<(), CartError> {
        if self.user_id != user_id { return Err(CartError::Forbidden); }
        Ok(())
    }

    /// Adds `qty` of `product`. An existing line accumulates quantity and takes
    /// the product's current price.
    pub fn add_item(&mut self, product: &Product, qty: Quantity) -> Result<&CartLine, CartError> {
        self.ensure_active()?;
        if product.store_id != self.store_id { return Err(CartError::ProductNotInStore); }

        let idx = match self.lines.iter().position(|l| l.product_id == product.id) {
            Some(idx) => {
                let wanted = self.lines[idx].quantity.add(qty);
                if !product.has_stock_for(wanted) {
                    return Err(CartError::InsufficientStock { available: product.stock, requested: wanted.value() });
                }
                let line = &mut self.lines[idx];
                line.quantity = wanted;
                line.price_at_time = product.price;
                idx
            }
            None => {
                if !product.has_stock_for(qty) {
                    return Err(CartError::InsufficientStock { available: product.stock, requested: qty.value() });
                }
                self.lines.push(CartLine { id: Uuid::now_v7(), cart_id: self.id, product_id: product.id, quantity: qty, price_at_time: product.price });
                self.lines.len() - 1
            }
        };
        self.recalculate();
        Ok(&self.lines[idx])
    }

    /// Sets a line's quantity, checked against the product's current stock.
    pub fn update_quantity(&mut self, line_id: Uuid, quantity: i32, stock: i32) -> Result<&CartLine, CartError> {
        self.ensure_active()?;
        let qty = Quantity::new(quantity).map_err(|_| CartError::InvalidQuantity(quantity))?;
        if qty.exceeds(stock) {
            return Err(CartError::InsufficientStock { available: stock, requested: quantity });
        }
        let idx = self.lines.iter().position(|l| l.id == line_id).ok_or(CartError::LineNotFound)?;
        self.lines[idx].quantity = qty;
        self.recalculate();
        Ok(&self.lines[idx])
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> Result<CartLine, CartError> {
        self.ensure_active()?;
        let idx = self.lines.iter().position(|l| l.id == line_id).ok_or(CartError::LineNotFound)?;
        let removed = self.lines.remove(idx);
        self.recalculate();
        Ok(removed)
    }

    pub fn clear(&mut self) { self.lines.clear(); self.recalculate(); }

    pub fn mark_checked_out(&mut self) -> Result<(), CartError> {
        self.ensure_active()?;
        if self.is_empty() { return Err(CartError::Empty); }
        self.status = CartStatus::CheckedOut;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), CartError> {
        if self.status != CartStatus::Active { return Err(CartError::NotActive); }
        Ok(())
    }

    fn recalculate(&mut self) {
        self.total_amount = self.lines.iter().map(CartLine::line_total).sum();
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError { LineNotFound, Forbidden, ProductNotInStore, NotActive, Empty, InvalidQuantity(i32), InsufficientStock { available: i32, requested: i32 } }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LineNotFound => write!(f, "Cart item not found"),
            Self::Forbidden => write!(f, "Cart belongs to another user"),
            Self::ProductNotInStore => write!(f, "Product does not belong to this store"),
            Self::NotActive => write!(f, "Cart is no longer active"),
            Self::Empty => write!(f, "Cart is empty"),
            Self::InvalidQuantity(q) => write!(f, "Valid quantity is required (got {q})"),
            Self::InsufficientStock { available, requested } => write!(f, "Insufficient stock: {available} available, {requested} requested"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::sample;
    use rust_decimal::Decimal;

    fn qty(n: i32) -> Quantity { Quantity::new(n).unwrap() }
    fn money(n: i64) -> Money { Money::new(Decimal::new(n, 0)) }

    fn assert_total_matches_lines(cart: &Cart) {
        let expected: Money = cart.lines.iter().map(|l| l.price_at_time.times(l.quantity)).sum();
        assert_eq!(cart.total_amount, expected);
    }

    #[test]
    fn test_cart_operations() {
        let store = Uuid::now_v7();
        let a = sample("A", 100, 10, store);
        let b = sample("B", 50, 10, store);
        let mut cart = Cart::open(Uuid::now_v7(), store);
        assert_eq!(cart.total_amount, Money::ZERO);

        let line_a = cart.add_item(&a, qty(2)).unwrap().id;
        assert_eq!(cart.total_amount, money(200));
        cart.add_item(&b, qty(1)).unwrap();
        assert_eq!(cart.total_amount, money(250));
        cart.remove_line(line_a).unwrap();
        assert_eq!(cart.total_amount, money(50));
        assert_total_matches_lines(&cart);
    }

    #[test]
    fn test_add_merges_and_refreshes_price() {
        let store = Uuid::now_v7();
        let mut p = sample("Widget", 10, 5, store);
        let mut cart = Cart::open(Uuid::now_v7(), store);
        cart.add_item(&p, qty(2)).unwrap();
        p.price = money(12);
        let line = cart.add_item(&p, qty(1)).unwrap();
        assert_eq!(line.quantity, qty(3));
        assert_eq!(line.price_at_time, money(12));
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.total_amount, money(36));
    }

    #[test]
    fn test_add_rejects_more_than_stock() {
        let store = Uuid::now_v7();
        let p = sample("Speaker", 149, 3, store);
        let mut cart = Cart::open(Uuid::now_v7(), store);
        assert_eq!(cart.add_item(&p, qty(4)).unwrap_err(), CartError::InsufficientStock { available: 3, requested: 4 });
        cart.add_item(&p, qty(2)).unwrap();
        // accumulated quantity counts against stock too
        assert!(matches!(cart.add_item(&p, qty(2)), Err(CartError::InsufficientStock { requested: 4, .. })));
        assert_eq!(cart.total_amount, money(298));
    }

    #[test]
    fn test_add_rejects_foreign_store_product() {
        let p = sample("Keyboard", 159, 20, Uuid::now_v7());
        let mut cart = Cart::open(Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(cart.add_item(&p, qty(1)).unwrap_err(), CartError::ProductNotInStore);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity() {
        let store = Uuid::now_v7();
        let p = sample("Earbuds", 199, 5, store);
        let mut cart = Cart::open(Uuid::now_v7(), store);
        let id = cart.add_item(&p, qty(1)).unwrap().id;
        assert_eq!(cart.update_quantity(id, 0, p.stock).unwrap_err(), CartError::InvalidQuantity(0));
        assert!(matches!(cart.update_quantity(id, 6, p.stock), Err(CartError::InsufficientStock { .. })));
        cart.update_quantity(id, 5, p.stock).unwrap();
        assert_eq!(cart.total_amount, money(995));
        assert_eq!(cart.update_quantity(Uuid::now_v7(), 1, 5).unwrap_err(), CartError::LineNotFound);
        assert_total_matches_lines(&cart);
    }

    #[test]
    fn test_ownership_and_clear() {
        let store = Uuid::now_v7();
        let owner = Uuid::now_v7();
        let p = sample("Mouse", 79, 8, store);
        let mut cart = Cart::open(owner, store);
        cart.add_item(&p, qty(2)).unwrap();
        assert_eq!(cart.ensure_owner(Uuid::now_v7()), Err(CartError::Forbidden));
        assert!(cart.ensure_owner(owner).is_ok());
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total_amount, Money::ZERO);
    }

    #[test]
    fn test_checked_out_cart_is_frozen() {
        let store = Uuid::now_v7();
        let p = sample("Mouse", 79, 8, store);
        let mut cart = Cart::open(Uuid::now_v7(), store);
        assert_eq!(cart.mark_checked_out(), Err(CartError::Empty));
        cart.add_item(&p, qty(1)).unwrap();
        cart.mark_checked_out().unwrap();
        assert_eq!(cart.add_item(&p, qty(1)).unwrap_err(), CartError::NotActive);
    }
}
