//! Company HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::email::company_verification;
use crate::services::{CompanyService, ProductService};
use crate::AppState;
use shared::{
    AddMemberRequest, Company, CompanyMember, CompanyProduct, CreateCompanyRequest, PageQuery,
    PaginatedResponse, ProductFilter, UpdateCompanyRequest, VerifyTokenRequest,
};

#[derive(Debug, Deserialize)]
pub struct CompanySearch {
    pub search: Option<String>,
}

/// Register a company owned by the current user
pub async fn create_company(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), AppError> {
    let service = CompanyService::new(state.db.clone());
    let registration = service.create(&user, body).await?;

    state.mailer.dispatch(company_verification(
        &user.email,
        &registration.company.name,
        &state.config.frontend_url,
        &registration.verification_token,
    ));

    Ok((StatusCode::CREATED, Json(registration.company)))
}

pub async fn verify_company(
    State(state): State<AppState>,
    Json(body): Json<VerifyTokenRequest>,
) -> Result<Json<Company>, AppError> {
    let service = CompanyService::new(state.db.clone());
    Ok(Json(service.verify(&body.token).await?))
}

pub async fn list_companies(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    Query(search): Query<CompanySearch>,
) -> Result<Json<PaginatedResponse<Company>>, AppError> {
    let service = CompanyService::new(state.db.clone());
    Ok(Json(service.list(&page, search.search.as_deref()).await?))
}

pub async fn get_my_company(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Company>, AppError> {
    let company_id = user.require_company()?;
    let service = CompanyService::new(state.db.clone());
    Ok(Json(service.get(company_id).await?))
}

pub async fn update_my_company(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<UpdateCompanyRequest>,
) -> Result<Json<Company>, AppError> {
    let company_id = user.require_owner()?;
    let service = CompanyService::new(state.db.clone());
    Ok(Json(service.update(company_id, body).await?))
}

pub async fn get_company_by_tax_id(
    State(state): State<AppState>,
    Path(tax_id): Path<String>,
) -> Result<Json<Company>, AppError> {
    let service = CompanyService::new(state.db.clone());
    Ok(Json(service.get_by_tax_id(&tax_id).await?))
}

/// A seller's orderable catalog
pub async fn get_company_catalog(
    State(state): State<AppState>,
    Path(tax_id): Path<String>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<PaginatedResponse<CompanyProduct>>, AppError> {
    let seller = CompanyService::new(state.db.clone())
        .get_by_tax_id(&tax_id)
        .await?;
    let service = ProductService::new(state.db.clone(), state.notifier.clone());
    Ok(Json(service.public_catalog(seller.id, &page, &filter).await?))
}

pub async fn list_members(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CompanyMember>>, AppError> {
    let company_id = user.require_company()?;
    let service = CompanyService::new(state.db.clone());
    Ok(Json(service.list_members(company_id).await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<CompanyMember>), AppError> {
    let company_id = user.require_owner()?;
    body.validate()?;
    let service = CompanyService::new(state.db.clone());
    let member = service.add_member(company_id, &body.email).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(member_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = CompanyService::new(state.db.clone());
    service.remove_member(&user, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave_company(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    let service = CompanyService::new(state.db.clone());
    service.leave(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}
