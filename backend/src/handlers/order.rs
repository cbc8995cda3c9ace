//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::OrderService;
use crate::AppState;
use shared::{
    CreateOrderRequest, OrderDetails, OrderFilter, PageQuery, PaginatedResponse,
    UpdateOrderProductsRequest,
};

fn service(state: &AppState) -> OrderService {
    OrderService::new(
        state.db.clone(),
        state.notifier.clone(),
        state.exchange_rates.clone(),
    )
}

/// Place an order as the buyer
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderDetails>), AppError> {
    let order = service(&state).create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<OrderFilter>,
    Query(page): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<OrderDetails>>, AppError> {
    let company_id = user.require_company()?;
    Ok(Json(service(&state).list(company_id, &filter, &page).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    let company_id = user.require_company()?;
    Ok(Json(service(&state).get(company_id, order_id).await?))
}

pub async fn update_order_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(body): Json<UpdateOrderProductsRequest>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(
        service(&state)
            .update_products(&user, order_id, body)
            .await?,
    ))
}

pub async fn delete_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service(&state).delete(&user, order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn accept_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(service(&state).accept(&user, order_id).await?))
}

pub async fn reject_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(service(&state).reject(&user, order_id).await?))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(service(&state).cancel(&user, order_id).await?))
}

/// Seller confirms the order was fulfilled
pub async fn complete_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, AppError> {
    Ok(Json(service(&state).complete(&user, order_id).await?))
}
