//! WebAssembly module for the Tradeflow platform
//!
//! Provides client-side helpers for:
//! - Tax ID and EAN validation before submitting forms
//! - Order status labels and the actions a party may take
//! - Line totals for the order basket

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use wasm_bindgen::prelude::*;

use shared::{allowed_actions, OrderParty, OrderStatus};

/// Whether a tax ID is well formed (10 digits)
#[wasm_bindgen]
pub fn validate_tax_id(tax_id: &str) -> bool {
    shared::validate_tax_id(tax_id.trim()).is_ok()
}

/// Whether an EAN is well formed (8 or 13 digits)
#[wasm_bindgen]
pub fn validate_ean(ean: &str) -> bool {
    shared::validate_ean(ean.trim()).is_ok()
}

/// Actions the seller or buyer may take on an order with the given status code.
///
/// Returns a JSON array such as `["accept","reject"]`; empty for unknown codes.
#[wasm_bindgen]
pub fn allowed_order_actions(status_code: i16, is_seller: bool) -> String {
    let party = if is_seller {
        OrderParty::Seller
    } else {
        OrderParty::Buyer
    };
    let actions = OrderStatus::from_code(status_code)
        .map(|status| allowed_actions(status, party))
        .unwrap_or_default();
    serde_json::to_string(&actions).unwrap_or_else(|_| "[]".to_string())
}

/// Display label of a status code
#[wasm_bindgen]
pub fn order_status_label(status_code: i16) -> String {
    OrderStatus::from_code(status_code)
        .map(|status| status.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Unit price times quantity, rounded to cents. `None` for unparseable prices.
#[wasm_bindgen]
pub fn line_total(unit_price: &str, quantity: i32) -> Option<String> {
    let price = Decimal::from_str(unit_price.trim()).ok()?;
    let total = price.checked_mul(Decimal::from(quantity))?;
    Some(
        total
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .to_string(),
    )
}
