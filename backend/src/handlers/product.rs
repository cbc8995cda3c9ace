//! Company product HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::ProductService;
use crate::AppState;
use shared::{
    CompanyProduct, CreateProductRequest, PageQuery, PaginatedResponse, ProductFilter,
    UpdateProductRequest,
};

fn service(state: &AppState) -> ProductService {
    ProductService::new(state.db.clone(), state.notifier.clone())
}

/// List the current company's catalog
pub async fn list_products(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<PaginatedResponse<CompanyProduct>>, AppError> {
    let company_id = user.require_company()?;
    Ok(Json(service(&state).list(company_id, &page, &filter).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<CompanyProduct>), AppError> {
    let product = service(&state).create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CompanyProduct>, AppError> {
    let company_id = user.require_company()?;
    Ok(Json(service(&state).get(company_id, product_id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<CompanyProduct>, AppError> {
    let company_id = user.require_company()?;
    Ok(Json(
        service(&state).update(company_id, product_id, body).await?,
    ))
}

pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let company_id = user.require_company()?;
    service(&state).delete(company_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
