use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use backstock_core::{DomainError, DomainResult, Entity, OrderId, OrderLineId, ProductId};

/// Order status lifecycle:
/// `pending → process_payment → paid → {on_delivery → delivered → completed}`,
/// with `cancelled` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    ProcessPayment,
    Paid,
    OnDelivery,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Position along the fulfilment chain; `None` for `Cancelled`.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::ProcessPayment => Some(1),
            OrderStatus::Paid => Some(2),
            OrderStatus::OnDelivery => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Completed => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    /// Declarative transition guard: forward movement along the chain, plus
    /// cancellation from any non-terminal state. The reconciler never calls
    /// this; only the explicit status-update operation enforces it.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::ProcessPayment => "Processing payment",
            OrderStatus::Paid => "Paid",
            OrderStatus::OnDelivery => "On delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Where the order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderChannel {
    Storefront,
    PointOfSale,
    Manual,
}

/// Human-facing unique order number. Generated, never client-supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Derive a number from a fresh UUIDv7 so numbers sort by creation time.
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        let simple = uuid.simple().to_string();
        Self(format!("ORD-{}", simple[..12].to_ascii_uppercase()))
    }

    pub fn from_string(raw: impl Into<String>) -> DomainResult<Self> {
        let value = raw.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("order number cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sales order. `total` is derived from the persisted lines and recomputed
/// after every creation/reconciliation, never taken from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: OrderNumber,
    pub customer: String,
    pub status: OrderStatus,
    pub channel: OrderChannel,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: OrderId,
        customer: impl Into<String>,
        channel: OrderChannel,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let customer = customer.into();
        if customer.trim().is_empty() {
            return Err(DomainError::validation("customer cannot be empty"));
        }
        Ok(Self {
            id,
            number: OrderNumber::generate(),
            customer,
            status: OrderStatus::Pending,
            channel,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a status transition through the declarative guard.
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invariant(format!(
                "illegal status transition: {} -> {}",
                self.status.label(),
                next.label()
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderLine {
    pub fn new(order_id: OrderId, product_id: ProductId, quantity: i64) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            id: OrderLineId::new(),
            order_id,
            product_id,
            quantity,
        })
    }
}

/// One line of an edit submission.
///
/// `id: None` means a new line; `remove: true` is the soft marked-for-deletion
/// flag — the line is credited back and hard-removed during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedLine {
    pub id: Option<OrderLineId>,
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub remove: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_is_prefixed_and_unique() {
        let a = OrderNumber::generate();
        let b = OrderNumber::generate();
        assert!(a.as_str().starts_with("ORD-"));
        assert_ne!(a, b);
    }

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::ProcessPayment));
        assert!(OrderStatus::ProcessPayment.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::OnDelivery.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::OnDelivery));
    }

    #[test]
    fn cancellation_reachable_from_any_non_terminal_state() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::ProcessPayment,
            OrderStatus::Paid,
            OrderStatus::OnDelivery,
            OrderStatus::Delivered,
        ] {
            assert!(status.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(!status.can_transition_to(OrderStatus::Pending));
            assert!(!status.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn transition_to_enforces_guard() {
        let mut order =
            Order::new(OrderId::new(), "PT Kopi Senja", OrderChannel::Storefront, Utc::now())
                .unwrap();
        order
            .transition_to(OrderStatus::ProcessPayment, Utc::now())
            .unwrap();
        let err = order
            .transition_to(OrderStatus::Pending, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(order.status, OrderStatus::ProcessPayment);
    }

    #[test]
    fn order_line_rejects_non_positive_quantity() {
        let err = OrderLine::new(OrderId::new(), ProductId::new(), 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
