//! Purchase order models and the order status state machine

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::types::Money;

/// Status of an order.
///
/// Persisted as a small integer; the gaps leave room for intermediate states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Rejected,
    Canceled,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Rejected,
        OrderStatus::Canceled,
        OrderStatus::Completed,
    ];

    pub fn code(&self) -> i16 {
        match self {
            OrderStatus::Pending => 10,
            OrderStatus::Accepted => 20,
            OrderStatus::Rejected => 30,
            OrderStatus::Canceled => 40,
            OrderStatus::Completed => 50,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            10 => Some(OrderStatus::Pending),
            20 => Some(OrderStatus::Accepted),
            30 => Some(OrderStatus::Rejected),
            40 => Some(OrderStatus::Canceled),
            50 => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Canceled | OrderStatus::Completed
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Accepted)
                | (OrderStatus::Pending, OrderStatus::Rejected)
                | (OrderStatus::Accepted, OrderStatus::Canceled)
                | (OrderStatus::Accepted, OrderStatus::Completed)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Accepted => write!(f, "Accepted"),
            OrderStatus::Rejected => write!(f, "Rejected"),
            OrderStatus::Canceled => write!(f, "Canceled"),
            OrderStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Which side of an order a company is on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderParty {
    Seller,
    Buyer,
}

/// A status transition requested by one of the parties
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Accept,
    Reject,
    Cancel,
    Complete,
}

impl OrderAction {
    pub const ALL: [OrderAction; 4] = [
        OrderAction::Accept,
        OrderAction::Reject,
        OrderAction::Cancel,
        OrderAction::Complete,
    ];

    /// The party allowed to request this transition
    pub fn party(&self) -> OrderParty {
        match self {
            OrderAction::Accept | OrderAction::Reject | OrderAction::Complete => {
                OrderParty::Seller
            }
            OrderAction::Cancel => OrderParty::Buyer,
        }
    }

    /// The only status this action may start from
    pub fn source(&self) -> OrderStatus {
        match self {
            OrderAction::Accept | OrderAction::Reject => OrderStatus::Pending,
            OrderAction::Cancel | OrderAction::Complete => OrderStatus::Accepted,
        }
    }

    pub fn target(&self) -> OrderStatus {
        match self {
            OrderAction::Accept => OrderStatus::Accepted,
            OrderAction::Reject => OrderStatus::Rejected,
            OrderAction::Cancel => OrderStatus::Canceled,
            OrderAction::Complete => OrderStatus::Completed,
        }
    }

    /// Whether the action changes stock and needs the order's lines locked
    pub fn moves_stock(&self) -> bool {
        matches!(self, OrderAction::Accept | OrderAction::Cancel)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::Accept => "accept",
            OrderAction::Reject => "reject",
            OrderAction::Cancel => "cancel",
            OrderAction::Complete => "complete",
        }
    }
}

/// Validate a transition and return the resulting status.
///
/// Fails with Conflict when `action` cannot start from `current`.
pub fn transition(current: OrderStatus, action: OrderAction) -> DomainResult<OrderStatus> {
    let target = action.target();
    if current != action.source() || !current.can_transition_to(target) {
        return Err(DomainError::conflict(
            "order",
            format!(
                "Cannot {} order: order not in {} state (current: {})",
                action.as_str(),
                action.source(),
                current
            ),
        ));
    }
    Ok(target)
}

/// Actions `party` may legally attempt on an order in `status`
pub fn allowed_actions(status: OrderStatus, party: OrderParty) -> Vec<OrderAction> {
    OrderAction::ALL
        .into_iter()
        .filter(|a| a.party() == party && a.source() == status)
        .collect()
}

/// A purchase order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub buyer_id: Uuid,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub user_name_who_made_order: String,
    /// Fixed at creation in the requested currency; never re-converted
    pub total_price: Money,
    pub products: Vec<OrderProduct>,
}

/// An order line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderProduct {
    pub company_product_id: Uuid,
    pub quantity: i32,
}

/// An order line as displayed, with catalog data read at request time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineView {
    pub company_product_id: Uuid,
    pub ean: String,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Money,
    pub is_available: bool,
    pub is_deleted: bool,
}

/// Full order view returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller_name: String,
    pub seller_tax_id: String,
    pub buyer_id: Uuid,
    pub buyer_name: String,
    pub buyer_tax_id: String,
    pub status: OrderStatus,
    pub status_code: i16,
    pub created_at: DateTime<Utc>,
    pub user_name_who_made_order: String,
    pub total_price: Money,
    pub products: Vec<OrderLineView>,
    /// What the requesting party may do next
    pub allowed_actions: Vec<OrderAction>,
}

/// Input for placing an order against a seller's catalog
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub seller_tax_id: String,
    /// EAN -> requested quantity
    #[validate(length(min = 1, message = "Order must contain at least one product"))]
    pub products: BTreeMap<String, i32>,
    pub currency_code: String,
}

/// Input for replacing the line items of a pending order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderProductsRequest {
    #[validate(length(min = 1, message = "Order must contain at least one product"))]
    pub products: BTreeMap<String, i32>,
}

/// Filters for listing orders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    /// List orders where the acting company is this party; both when absent
    pub party: Option<OrderParty>,
    pub status: Option<OrderStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(OrderStatus::from_code(15), None);
    }

    #[test]
    fn status_codes_match_persisted_values() {
        assert_eq!(OrderStatus::Pending.code(), 10);
        assert_eq!(OrderStatus::Accepted.code(), 20);
        assert_eq!(OrderStatus::Rejected.code(), 30);
        assert_eq!(OrderStatus::Canceled.code(), 40);
        assert_eq!(OrderStatus::Completed.code(), 50);
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in OrderStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn transition_rejects_wrong_source() {
        let err = transition(OrderStatus::Pending, OrderAction::Cancel).unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert!(err.to_string().contains("order not in Accepted state"));
    }

    #[test]
    fn allowed_actions_per_party() {
        assert_eq!(
            allowed_actions(OrderStatus::Pending, OrderParty::Seller),
            vec![OrderAction::Accept, OrderAction::Reject]
        );
        assert!(allowed_actions(OrderStatus::Pending, OrderParty::Buyer).is_empty());
        assert_eq!(
            allowed_actions(OrderStatus::Accepted, OrderParty::Buyer),
            vec![OrderAction::Cancel]
        );
        assert_eq!(
            allowed_actions(OrderStatus::Accepted, OrderParty::Seller),
            vec![OrderAction::Complete]
        );
        assert!(allowed_actions(OrderStatus::Completed, OrderParty::Seller).is_empty());
    }
}
