//! Inventory movement HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::inventory::{InventoryService, RecordedMovement};
use crate::AppState;
use shared::{InventoryMovement, PageQuery, PaginatedResponse, RecordMovementRequest};

/// Record a manual stock movement
pub async fn record_movement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<RecordMovementRequest>,
) -> Result<(StatusCode, Json<RecordedMovement>), AppError> {
    let service = InventoryService::new(state.db.clone(), state.notifier.clone());
    let recorded = service.record_movement(&user, product_id, body).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// Movement history of a product, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<InventoryMovement>>, AppError> {
    let company_id = user.require_company()?;
    let service = InventoryService::new(state.db.clone(), state.notifier.clone());
    Ok(Json(
        service.list_movements(company_id, product_id, &page).await?,
    ))
}
