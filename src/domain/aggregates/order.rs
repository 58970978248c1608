//! Order Aggregate

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::{Cart, CartStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub cart_id: Option<Uuid>,
    pub status: OrderStatus,
    pub total_amount: Money,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem { pub id: Uuid, pub order_id: Uuid, pub product_id: Uuid, pub quantity: Quantity, pub unit_price: Money, pub total: Money }

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus { Pending, Accepted, Delivered, Disputed }

/// Who is asking for a status change, relative to the order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Party { Buyer, StoreOwner, Admin }

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Accepted) | (Pending, Delivered) | (Accepted, Delivered) | (Accepted, Disputed) | (Delivered, Disputed))
    }

    fn permitted_for(next: OrderStatus, party: Party) -> bool {
        match (next, party) {
            (_, Party::Admin) => true,
            (OrderStatus::Accepted | OrderStatus::Delivered, Party::StoreOwner) => true,
            (OrderStatus::Disputed, Party::Buyer) => true,
            (OrderStatus::Pending, _) => false,
            (OrderStatus::Accepted | OrderStatus::Delivered, Party::Buyer) => false,
            (OrderStatus::Disputed, Party::StoreOwner) => false,
        }
    }
}

impl Order {
    /// Snapshots a cart into a new pending order. The cart total is copied, not recomputed.
    pub fn place(cart: &Cart) -> Result<Self, OrderError> {
        if cart.status != CartStatus::Active { return Err(OrderError::CartNotActive); }
        if cart.is_empty() { return Err(OrderError::EmptyCart); }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let items = cart.lines.iter().map(|l| OrderItem {
            id: Uuid::now_v7(), order_id: id, product_id: l.product_id, quantity: l.quantity,
            unit_price: l.price_at_time, total: l.line_total(),
        }).collect();
        let mut order = Self {
            id, order_number: next_order_number(), user_id: cart.user_id, store_id: cart.store_id,
            cart_id: Some(cart.id), status: OrderStatus::Pending, total_amount: cart.total_amount,
            items, placed_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, store_id: order.store_id, total: order.total_amount }));
        Ok(order)
    }

    pub fn transition(&mut self, next: OrderStatus, party: Party) -> Result<(), OrderError> {
        if !OrderStatus::permitted_for(next, party) { return Err(OrderError::NotPermitted { to: next }); }
        if !self.status.can_transition_to(next) { return Err(OrderError::InvalidTransition { from: self.status, to: next }); }
        let from = self.status;
        self.status = next;
        self.updated_at = Utc::now();
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
        Ok(())
    }

    pub fn is_reviewable(&self) -> bool { self.status == OrderStatus::Delivered }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

fn next_order_number() -> String { format!("ORD-{:08}", rand::thread_rng().gen_range(0..100_000_000u32)) }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    EmptyCart,
    CartNotActive,
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    NotPermitted { to: OrderStatus },
    NotReviewable,
}
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCart => write!(f, "Cart is empty"),
            Self::CartNotActive => write!(f, "Cart has already been checked out"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {from:?} to {to:?}"),
            Self::NotPermitted { to } => write!(f, "Not allowed to set order status to {to:?}"),
            Self::NotReviewable => write!(f, "Only delivered orders can be reviewed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::sample;

    fn cart_with_items() -> Cart {
        let store = Uuid::now_v7();
        let mut cart = Cart::open(Uuid::now_v7(), store);
        cart.add_item(&sample("Headphones", 299, 5, store), Quantity::new(1).unwrap()).unwrap();
        cart.add_item(&sample("Speaker", 149, 5, store), Quantity::new(2).unwrap()).unwrap();
        cart
    }

    #[test]
    fn test_place_snapshots_cart() {
        let cart = cart_with_items();
        let mut order = Order::place(&cart).unwrap();
        assert_eq!(order.total_amount, cart.total_amount);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items.iter().map(|i| i.total).sum::<Money>(), order.total_amount);
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.take_events().len(), 1);
        assert!(Order::place(&Cart::open(Uuid::now_v7(), Uuid::now_v7())).is_err());
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(&cart_with_items()).unwrap();
        order.transition(OrderStatus::Accepted, Party::StoreOwner).unwrap();
        order.transition(OrderStatus::Delivered, Party::StoreOwner).unwrap();
        assert!(order.is_reviewable());
        order.transition(OrderStatus::Disputed, Party::Buyer).unwrap();
        assert_eq!(order.status, OrderStatus::Disputed);
        assert_eq!(order.transition(OrderStatus::Delivered, Party::Admin), Err(OrderError::InvalidTransition { from: OrderStatus::Disputed, to: OrderStatus::Delivered }));
    }

    #[test]
    fn test_transition_permissions() {
        let mut order = Order::place(&cart_with_items()).unwrap();
        assert_eq!(order.transition(OrderStatus::Accepted, Party::Buyer), Err(OrderError::NotPermitted { to: OrderStatus::Accepted }));
        assert!(order.transition(OrderStatus::Disputed, Party::StoreOwner).is_err());
        // a pending order cannot be disputed, even by its buyer
        assert!(matches!(order.transition(OrderStatus::Disputed, Party::Buyer), Err(OrderError::InvalidTransition { .. })));
        order.transition(OrderStatus::Delivered, Party::Admin).unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
    }
}
