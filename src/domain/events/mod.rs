//! Domain events
use crate::domain::aggregates::order::OrderStatus;
use crate::domain::value_objects::Money;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "aggregate", content = "event")]
pub enum DomainEvent {
    Order(OrderEvent),
    Settlement(SettlementEvent),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    Placed { order_id: Uuid, store_id: Uuid, total: Money },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum SettlementEvent {
    Generated { settlement_id: Uuid, store_id: Uuid, net: Money },
    Completed { settlement_id: Uuid, store_id: Uuid, net: Money },
    Failed { settlement_id: Uuid, store_id: Uuid, reason: String },
}

impl DomainEvent {
    /// Message subject the event is published on, e.g. `commerce.order.placed`.
    pub fn subject(&self) -> &'static str {
        match self {
            DomainEvent::Order(OrderEvent::Placed { .. }) => "commerce.order.placed",
            DomainEvent::Order(OrderEvent::StatusChanged { .. }) => "commerce.order.status_changed",
            DomainEvent::Settlement(SettlementEvent::Generated { .. }) => "commerce.settlement.generated",
            DomainEvent::Settlement(SettlementEvent::Completed { .. }) => "commerce.settlement.completed",
            DomainEvent::Settlement(SettlementEvent::Failed { .. }) => "commerce.settlement.failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_shape() {
        let e = DomainEvent::Settlement(SettlementEvent::Failed { settlement_id: Uuid::nil(), store_id: Uuid::nil(), reason: "INVALID_ACCOUNT".into() });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["aggregate"], "Settlement");
        assert_eq!(json["event"]["type"], "Failed");
        assert_eq!(e.subject(), "commerce.settlement.failed");
    }
}
