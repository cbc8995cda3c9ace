//! Category HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::CategoryService;
use crate::AppState;
use shared::{Category, CategoryNode, CreateCategoryRequest};

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let service = CategoryService::new(state.db.clone());
    Ok(Json(service.list().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let service = CategoryService::new(state.db.clone());
    Ok((StatusCode::CREATED, Json(service.create(body).await?)))
}

pub async fn category_tree(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryNode>>, AppError> {
    let service = CategoryService::new(state.db.clone());
    Ok(Json(service.tree().await?))
}

pub async fn category_path(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<Json<Vec<Category>>, AppError> {
    let service = CategoryService::new(state.db.clone());
    Ok(Json(service.path(category_id).await?))
}
