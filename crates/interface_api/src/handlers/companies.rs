//! Company administration (super-admin host only)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{CompanyId, TenantContext};
use domain_tenancy::{Company, CompanyUpdate, NewCompany};

use crate::dto::billing::CompanyListQuery;
use crate::{error::ApiError, AppState};

pub async fn create_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Json(request): Json<NewCompany>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let company = state.companies.create_company(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn list_companies(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<CompanyListQuery>,
) -> Result<Json<Vec<Company>>, ApiError> {
    Ok(Json(state.companies.list_companies(&ctx, query.status).await?))
}

/// Tenants may read their own company
pub async fn get_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.get_company(&ctx, id).await?))
}

pub async fn update_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CompanyId>,
    Json(update): Json<CompanyUpdate>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.update_company(&ctx, id, update).await?))
}

pub async fn enable_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.enable_company(&ctx, id).await?))
}

pub async fn disable_company(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.companies.disable_company(&ctx, id).await?))
}
