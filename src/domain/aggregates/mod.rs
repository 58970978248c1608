//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod settlement;

pub use product::{AlertPriority, AlertType, Product, ProductError, StockAlert};
pub use order::{Order, OrderError, OrderItem, OrderStatus, Party};
pub use cart::{Cart, CartError, CartLine, CartStatus};
pub use settlement::{OrderAmount, PaymentMethod, Settlement, SettlementDetail, SettlementError, SettlementRates, SettlementRequest, SettlementStatus};
