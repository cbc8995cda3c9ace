//! Inventory movement ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Kind of stock movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Inbound,
    Outbound,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Inbound => "inbound",
            MovementType::Outbound => "outbound",
            MovementType::Adjustment => "adjustment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inbound" => Some(MovementType::Inbound),
            "outbound" => Some(MovementType::Outbound),
            "adjustment" => Some(MovementType::Adjustment),
            _ => None,
        }
    }

    /// Signed effect on stock of a movement of this type.
    ///
    /// Inbound and Outbound take a positive magnitude; Adjustment takes a
    /// non-zero signed delta.
    pub fn signed_effect(&self, quantity: i32) -> DomainResult<i32> {
        match self {
            MovementType::Inbound if quantity > 0 => Ok(quantity),
            MovementType::Outbound if quantity > 0 => Ok(-quantity),
            MovementType::Adjustment if quantity != 0 => Ok(quantity),
            MovementType::Adjustment => Err(DomainError::invalid_field(
                "quantity",
                "Adjustment quantity cannot be zero",
            )),
            _ => Err(DomainError::invalid_field(
                "quantity",
                format!("{} quantity must be positive", self.as_str()),
            )),
        }
    }
}

/// An append-only stock ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: Uuid,
    pub company_product_id: Uuid,
    pub movement_type: MovementType,
    /// Signed effect on stock
    pub quantity: i32,
    pub comment: Option<String>,
    /// Order whose transition produced this movement, if any
    pub order_id: Option<Uuid>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a manual movement
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordMovementRequest {
    pub movement_type: MovementType,
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub comment: Option<String>,
}

/// Apply a signed delta to a stock level.
///
/// Fails with Conflict when the result would be negative.
pub fn apply_stock_delta(current_stock: i32, delta: i32) -> DomainResult<i32> {
    let next = current_stock
        .checked_add(delta)
        .ok_or_else(|| DomainError::invalid_field("quantity", "Quantity out of range"))?;
    if next < 0 {
        return Err(DomainError::conflict(
            "stock",
            format!(
                "Insufficient stock: {} on hand, movement requires {}",
                current_stock, -delta
            ),
        ));
    }
    Ok(next)
}

/// Sum of signed movement quantities
pub fn ledger_balance(movements: &[InventoryMovement]) -> i64 {
    movements.iter().map(|m| i64::from(m.quantity)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_effect_by_type() {
        assert_eq!(MovementType::Inbound.signed_effect(5), Ok(5));
        assert_eq!(MovementType::Outbound.signed_effect(5), Ok(-5));
        assert_eq!(MovementType::Adjustment.signed_effect(-3), Ok(-3));
        assert!(MovementType::Inbound.signed_effect(-5).is_err());
        assert!(MovementType::Outbound.signed_effect(0).is_err());
        assert!(MovementType::Adjustment.signed_effect(0).is_err());
    }

    #[test]
    fn stock_never_goes_negative() {
        assert_eq!(apply_stock_delta(10, -10), Ok(0));
        let err = apply_stock_delta(10, -11).unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(apply_stock_delta(i32::MAX, 1).is_err());
    }

    #[test]
    fn movement_type_parses() {
        for t in [MovementType::Inbound, MovementType::Outbound, MovementType::Adjustment] {
            assert_eq!(MovementType::parse(t.as_str()), Some(t));
        }
        assert_eq!(MovementType::parse("transfer"), None);
    }
}
