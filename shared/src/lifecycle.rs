//! Order lifecycle rules
//!
//! Pure functions that decide what an order operation is allowed to do. The
//! backend loads the rows, calls into these rules, and applies the returned
//! plan inside a single database transaction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::models::{transition, CompanyProduct, MovementType, OrderAction, OrderParty, OrderStatus};
use crate::types::Money;
use crate::validation::{validate_currency_code, validate_ean, validate_order_quantity};

/// A requested line resolved against the seller's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    pub company_product_id: Uuid,
    pub ean: String,
    pub quantity: i32,
    pub unit_price: Money,
}

/// A line of a stored order together with the product's current stock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStock {
    pub company_product_id: Uuid,
    pub ean: String,
    pub quantity: i32,
    pub stock_quantity: i32,
}

/// One product's stock change within a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub company_product_id: Uuid,
    pub previous_stock: i32,
    pub new_stock: i32,
    /// Signed quantity recorded on the inventory movement
    pub delta: i32,
}

/// Ledger entry written for every stock change of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMovement {
    pub movement_type: MovementType,
    pub comment: &'static str,
}

/// Everything a status transition does, decided before any write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: OrderStatus,
    /// `None` when the action leaves stock alone
    pub movement: Option<PlannedMovement>,
    pub changes: Vec<StockChange>,
}

/// Reject orders a company places against itself
pub fn ensure_not_self_order(buyer_id: Uuid, seller_id: Uuid) -> DomainResult<()> {
    if buyer_id == seller_id {
        return Err(DomainError::invalid_field(
            "seller_tax_id",
            "A company cannot place an order with itself",
        ));
    }
    Ok(())
}

/// Check that `acting_company` is the `party` of an order
pub fn authorize_party(
    seller_id: Uuid,
    buyer_id: Uuid,
    acting_company: Uuid,
    party: OrderParty,
) -> DomainResult<()> {
    let expected = match party {
        OrderParty::Seller => seller_id,
        OrderParty::Buyer => buyer_id,
    };
    if acting_company != expected {
        let role = match party {
            OrderParty::Seller => "seller",
            OrderParty::Buyer => "buyer",
        };
        return Err(DomainError::forbidden(format!(
            "Only the {} company may perform this operation",
            role
        )));
    }
    Ok(())
}

/// Check that `acting_company` is either party of an order
pub fn authorize_viewer(seller_id: Uuid, buyer_id: Uuid, acting_company: Uuid) -> DomainResult<()> {
    if acting_company != seller_id && acting_company != buyer_id {
        return Err(DomainError::forbidden(
            "Only the seller or the buyer may access this order",
        ));
    }
    Ok(())
}

/// Line items may only be edited, and the order deleted, before any stock moved
pub fn ensure_pending(status: OrderStatus, operation: &str) -> DomainResult<()> {
    if status != OrderStatus::Pending {
        return Err(DomainError::conflict(
            "order",
            format!(
                "Cannot {} order: order not in Pending state (current: {})",
                operation, status
            ),
        ));
    }
    Ok(())
}

/// Resolve and validate a requested EAN -> quantity map against the seller's catalog.
///
/// Every EAN is resolved first (NotFound for unknown, unavailable or deleted
/// products), then every quantity is checked against current stock
/// (BadRequest naming the EAN).
pub fn validate_order_lines(
    requested: &BTreeMap<String, i32>,
    catalog: &[CompanyProduct],
) -> DomainResult<Vec<ValidatedLine>> {
    if requested.is_empty() {
        return Err(DomainError::invalid_field(
            "products",
            "Order must contain at least one product",
        ));
    }

    let mut resolved = Vec::with_capacity(requested.len());
    for (ean, quantity) in requested {
        if validate_ean(ean).is_err() {
            return Err(DomainError::not_found(format!("Product with EAN {}", ean)));
        }
        let product = catalog
            .iter()
            .find(|p| p.ean == *ean && p.is_orderable())
            .ok_or_else(|| DomainError::not_found(format!("Product with EAN {}", ean)))?;
        resolved.push((product, *quantity));
    }

    resolved
        .into_iter()
        .map(|(product, quantity)| {
            if validate_order_quantity(quantity).is_err() || quantity > product.stock_quantity {
                return Err(DomainError::invalid_field(
                    "products",
                    format!(
                        "Invalid quantity {} for product EAN {} (available: {})",
                        quantity, product.ean, product.stock_quantity
                    ),
                ));
            }
            Ok(ValidatedLine {
                company_product_id: product.id,
                ean: product.ean.clone(),
                quantity,
                unit_price: product.price.clone(),
            })
        })
        .collect()
}

/// Currencies that need a rate into `target` before the total can be computed
pub fn currencies_to_convert(lines: &[ValidatedLine], target: &str) -> BTreeSet<String> {
    lines
        .iter()
        .map(|l| l.unit_price.currency_code.clone())
        .filter(|code| code != target)
        .collect()
}

/// Sum of unit price x quantity in `target`, rounded to cents.
///
/// `rates` maps a source currency to the multiplier into `target`; every
/// currency returned by [`currencies_to_convert`] must be present.
pub fn order_total(
    lines: &[ValidatedLine],
    target: &str,
    rates: &HashMap<String, Decimal>,
) -> DomainResult<Money> {
    validate_currency_code(target)
        .map_err(|msg| DomainError::invalid_field("currency_code", msg))?;

    let mut total = Decimal::ZERO;
    for line in lines {
        let line_total = line.unit_price.amount * Decimal::from(line.quantity);
        let converted = if line.unit_price.currency_code == target {
            line_total
        } else {
            let rate = rates.get(&line.unit_price.currency_code).ok_or_else(|| {
                DomainError::bad_request(format!(
                    "No exchange rate from {} to {}",
                    line.unit_price.currency_code, target
                ))
            })?;
            line_total * rate
        };
        total += converted;
    }

    Ok(Money::new(
        total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        target,
    ))
}

/// Stock changes for accepting an order.
///
/// All-or-nothing: if any line exceeds current stock the whole plan fails
/// with Conflict.
pub fn plan_acceptance(lines: &[LineStock]) -> DomainResult<Vec<StockChange>> {
    let short: Vec<String> = lines
        .iter()
        .filter(|l| l.quantity > l.stock_quantity)
        .map(|l| {
            format!(
                "EAN {} (ordered {}, in stock {})",
                l.ean, l.quantity, l.stock_quantity
            )
        })
        .collect();
    if !short.is_empty() {
        return Err(DomainError::conflict(
            "stock",
            format!("Insufficient stock to accept order: {}", short.join(", ")),
        ));
    }

    Ok(lines
        .iter()
        .map(|l| StockChange {
            company_product_id: l.company_product_id,
            previous_stock: l.stock_quantity,
            new_stock: l.stock_quantity - l.quantity,
            delta: -l.quantity,
        })
        .collect())
}

/// Stock changes for canceling an accepted order: every line goes back to stock
pub fn plan_cancellation(lines: &[LineStock]) -> DomainResult<Vec<StockChange>> {
    lines
        .iter()
        .map(|l| {
            let new_stock = l.stock_quantity.checked_add(l.quantity).ok_or_else(|| {
                DomainError::conflict("stock", format!("Stock overflow for EAN {}", l.ean))
            })?;
            Ok(StockChange {
                company_product_id: l.company_product_id,
                previous_stock: l.stock_quantity,
                new_stock,
                delta: l.quantity,
            })
        })
        .collect()
}

/// Plan a status transition requested by `acting_company`.
///
/// Checks run in order: party (Forbidden), state edge (Conflict), then stock
/// (Conflict on `stock`). `lines` must hold the order's lines with current
/// stock whenever [`OrderAction::moves_stock`] is true; it is ignored otherwise.
pub fn plan_transition(
    seller_id: Uuid,
    buyer_id: Uuid,
    acting_company: Uuid,
    current: OrderStatus,
    action: OrderAction,
    lines: &[LineStock],
) -> DomainResult<TransitionPlan> {
    authorize_party(seller_id, buyer_id, acting_company, action.party())?;
    let next = transition(current, action)?;

    let (movement, changes) = match action {
        OrderAction::Accept => (
            Some(PlannedMovement {
                movement_type: MovementType::Outbound,
                comment: "Order accepted",
            }),
            plan_acceptance(lines)?,
        ),
        OrderAction::Cancel => (
            Some(PlannedMovement {
                movement_type: MovementType::Inbound,
                comment: "Order canceled",
            }),
            plan_cancellation(lines)?,
        ),
        OrderAction::Reject | OrderAction::Complete => (None, Vec::new()),
    };

    Ok(TransitionPlan {
        next,
        movement,
        changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn product(ean: &str, stock: i32, price: &str, currency: &str) -> CompanyProduct {
        CompanyProduct {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            ean: ean.to_string(),
            name: format!("Product {}", ean),
            description: None,
            category_id: None,
            image_url: None,
            stock_quantity: stock,
            is_available: true,
            price: Money::new(Decimal::from_str(price).unwrap(), currency),
            is_deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unknown_ean_is_not_found_before_quantity_checks() {
        let catalog = vec![product("5099206027295", 150, "10.00", "PLN")];
        let mut requested = BTreeMap::new();
        requested.insert("5099206027295".to_string(), 99999);
        requested.insert("5901234123457".to_string(), 1);

        let err = validate_order_lines(&requested, &catalog).unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn unavailable_and_deleted_products_are_not_found() {
        let mut hidden = product("5099206027295", 150, "10.00", "PLN");
        hidden.is_available = false;
        let mut deleted = product("5901234123457", 150, "10.00", "PLN");
        deleted.is_deleted = true;
        let catalog = vec![hidden, deleted];

        for ean in ["5099206027295", "5901234123457"] {
            let requested = BTreeMap::from([(ean.to_string(), 1)]);
            let err = validate_order_lines(&requested, &catalog).unwrap_err();
            assert_eq!(err.kind(), "not_found");
        }
    }

    #[test]
    fn quantity_over_stock_names_the_ean() {
        let catalog = vec![product("5099206027295", 150, "10.00", "PLN")];
        let requested = BTreeMap::from([("5099206027295".to_string(), 99999)]);
        let err = validate_order_lines(&requested, &catalog).unwrap_err();
        assert_eq!(err.kind(), "bad_request");
        assert!(err.to_string().contains("5099206027295"));
    }

    #[test]
    fn total_converts_foreign_lines() {
        let catalog = vec![
            product("5099206027295", 150, "10.00", "PLN"),
            product("5901234123457", 50, "2.50", "EUR"),
        ];
        let requested = BTreeMap::from([
            ("5099206027295".to_string(), 3),
            ("5901234123457".to_string(), 4),
        ]);
        let lines = validate_order_lines(&requested, &catalog).unwrap();
        let needed = currencies_to_convert(&lines, "PLN");
        assert_eq!(needed.into_iter().collect::<Vec<_>>(), vec!["EUR".to_string()]);

        let rates = HashMap::from([("EUR".to_string(), Decimal::from_str("4.3").unwrap())]);
        let total = order_total(&lines, "PLN", &rates).unwrap();
        // 3 * 10.00 + 4 * 2.50 * 4.3 = 30 + 43
        assert_eq!(total, Money::new(Decimal::from_str("73.00").unwrap(), "PLN"));
    }

    #[test]
    fn total_without_rate_fails() {
        let catalog = vec![product("5901234123457", 50, "2.50", "EUR")];
        let requested = BTreeMap::from([("5901234123457".to_string(), 1)]);
        let lines = validate_order_lines(&requested, &catalog).unwrap();
        assert!(order_total(&lines, "PLN", &HashMap::new()).is_err());
    }

    #[test]
    fn acceptance_is_all_or_nothing() {
        let lines = vec![
            LineStock {
                company_product_id: Uuid::new_v4(),
                ean: "5099206027295".into(),
                quantity: 20,
                stock_quantity: 150,
            },
            LineStock {
                company_product_id: Uuid::new_v4(),
                ean: "5901234123457".into(),
                quantity: 11,
                stock_quantity: 10,
            },
        ];
        let err = plan_acceptance(&lines).unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert!(err.to_string().contains("5901234123457"));
        assert!(!err.to_string().contains("5099206027295"));
    }

    #[test]
    fn authorization_by_party() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        assert!(authorize_party(seller, buyer, seller, OrderParty::Seller).is_ok());
        assert_eq!(
            authorize_party(seller, buyer, buyer, OrderParty::Seller)
                .unwrap_err()
                .kind(),
            "forbidden"
        );
        assert!(authorize_viewer(seller, buyer, buyer).is_ok());
        assert!(authorize_viewer(seller, buyer, Uuid::new_v4()).is_err());
    }

    fn line(quantity: i32, stock: i32) -> LineStock {
        LineStock {
            company_product_id: Uuid::new_v4(),
            ean: "5099206027295".into(),
            quantity,
            stock_quantity: stock,
        }
    }

    #[test]
    fn accept_plan_moves_stock_outbound() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let plan = plan_transition(
            seller,
            buyer,
            seller,
            OrderStatus::Pending,
            OrderAction::Accept,
            &[line(20, 150)],
        )
        .unwrap();

        assert_eq!(plan.next, OrderStatus::Accepted);
        assert_eq!(plan.movement.unwrap().movement_type, MovementType::Outbound);
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].new_stock, 130);
        assert_eq!(plan.changes[0].delta, -20);
    }

    #[test]
    fn cancel_plan_returns_stock_inbound() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let plan = plan_transition(
            seller,
            buyer,
            buyer,
            OrderStatus::Accepted,
            OrderAction::Cancel,
            &[line(20, 130)],
        )
        .unwrap();

        assert_eq!(plan.next, OrderStatus::Canceled);
        assert_eq!(plan.movement.unwrap().movement_type, MovementType::Inbound);
        assert_eq!(plan.changes[0].new_stock, 150);
        assert_eq!(plan.changes[0].delta, 20);
    }

    #[test]
    fn reject_and_complete_leave_stock_alone() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        for (status, action) in [
            (OrderStatus::Pending, OrderAction::Reject),
            (OrderStatus::Accepted, OrderAction::Complete),
        ] {
            let plan =
                plan_transition(seller, buyer, seller, status, action, &[line(20, 150)]).unwrap();
            assert_eq!(plan.next, action.target());
            assert!(plan.movement.is_none());
            assert!(plan.changes.is_empty());
        }
    }

    #[test]
    fn stock_movement_matches_moves_stock() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        for action in OrderAction::ALL {
            let acting = match action.party() {
                OrderParty::Seller => seller,
                OrderParty::Buyer => buyer,
            };
            let plan =
                plan_transition(seller, buyer, acting, action.source(), action, &[line(5, 50)])
                    .unwrap();
            assert_eq!(plan.movement.is_some(), action.moves_stock(), "{:?}", action);
        }
    }

    #[test]
    fn party_is_checked_before_state_and_state_before_stock() {
        let seller = Uuid::new_v4();
        let buyer = Uuid::new_v4();

        // Wrong party on a terminal order with short stock: Forbidden
        let err = plan_transition(
            seller,
            buyer,
            buyer,
            OrderStatus::Completed,
            OrderAction::Accept,
            &[line(20, 1)],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "forbidden");

        // Right party, wrong state, short stock: Conflict on the order
        let err = plan_transition(
            seller,
            buyer,
            seller,
            OrderStatus::Accepted,
            OrderAction::Accept,
            &[line(20, 1)],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { ref resource, .. } if resource == "order"));

        // Right party, right state, short stock: Conflict on stock
        let err = plan_transition(
            seller,
            buyer,
            seller,
            OrderStatus::Pending,
            OrderAction::Accept,
            &[line(20, 1)],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { ref resource, .. } if resource == "stock"));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let catalog = vec![product("5099206027295", 150, "10.00", "PLN")];
        for quantity in [0, -3] {
            let requested = BTreeMap::from([("5099206027295".to_string(), quantity)]);
            let err = validate_order_lines(&requested, &catalog).unwrap_err();
            assert_eq!(err.kind(), "bad_request");
            assert!(err.to_string().contains("5099206027295"));
        }
    }
}
