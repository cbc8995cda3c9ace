//! Exchange-rate lookup handler

use axum::{
    extract::{Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;
use shared::validate_currency_code;

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
}

pub async fn get_rate(
    State(state): State<AppState>,
    Query(query): Query<RateQuery>,
) -> Result<Json<RateResponse>, AppError> {
    let from = query.from.trim().to_uppercase();
    let to = query.to.trim().to_uppercase();
    validate_currency_code(&from).map_err(|msg| AppError::validation("from", msg))?;
    validate_currency_code(&to).map_err(|msg| AppError::validation("to", msg))?;

    let rate = state.exchange_rates.rate(&from, &to).await?;
    Ok(Json(RateResponse { from, to, rate }))
}
