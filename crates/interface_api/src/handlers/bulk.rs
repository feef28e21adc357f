//! Bulk customer operations and CSV import

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{BulkImportId, TenantContext};
use domain_bulk::{BulkImport, BulkOutcome, FieldMapping};
use domain_reseller::Principal;

use super::target_company;
use crate::auth::require_admin;
use crate::dto::bulk::{BulkRequest, ImportRequest};
use crate::dto::{CompanyScope, LimitQuery};
use crate::{error::ApiError, AppState};

const DEFAULT_IMPORT_LIST: u32 = 20;

/// Applies one verb to a list of customers
///
/// Always 200 with counts; chunks that failed are listed in the outcome.
pub async fn execute(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<BulkRequest>,
) -> Result<Json<BulkOutcome>, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    let outcome = state
        .bulk
        .execute(&ctx, company_id, &request.customer_ids, request.verb)
        .await?;
    Ok(Json(outcome))
}

pub async fn import_customers(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<ImportRequest>,
) -> Result<(StatusCode, Json<BulkImport>), ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    let mapping = request.mapping.unwrap_or_else(FieldMapping::identity);
    let import = state
        .bulk
        .import_customers(
            &ctx,
            company_id,
            Some(principal.user_id),
            &request.file_name,
            request.content.as_bytes(),
            &mapping,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(import)))
}

pub async fn list_imports(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<BulkImport>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_IMPORT_LIST);
    Ok(Json(state.bulk.list_imports(&ctx, limit).await?))
}

pub async fn get_import(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<BulkImportId>,
) -> Result<Json<BulkImport>, ApiError> {
    Ok(Json(state.bulk.get_import(&ctx, id).await?))
}
