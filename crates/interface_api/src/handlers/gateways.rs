//! Payment gateway endpoints
//!
//! Every call goes through the audited wrapper, so each request leaves a
//! gateway transaction row whatever the outcome.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use core_kernel::TenantContext;
use domain_integrations::{GatewayPaymentRequest, GatewayResponse, GatewayTransactionLog};

use super::target_company;
use crate::dto::gateway::{CheckBillRequest, GatewayPaymentResponse, SearchRequest, TransactionQuery};
use crate::dto::CompanyScope;
use crate::{error::ApiError, AppState};

const DEFAULT_TRANSACTION_LIST: u32 = 50;

pub async fn list_gateways(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.gateways.names().into_iter().map(str::to_string).collect())
}

pub async fn check_bill(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(name): Path<String>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<CheckBillRequest>,
) -> Result<Json<GatewayResponse>, ApiError> {
    let company_id = target_company(&ctx, scope.company_id)?;
    let gateway = state.gateways.get(&name)?;
    Ok(Json(gateway.check_bill(&ctx, company_id, &request.customer_ref).await?))
}

/// Collects a payment through the gateway and records it if accepted
pub async fn process_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(name): Path<String>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<GatewayPaymentRequest>,
) -> Result<Json<GatewayPaymentResponse>, ApiError> {
    let company_id = target_company(&ctx, scope.company_id)?;
    let gateway = state.gateways.get(&name)?;
    let (response, payment) = state
        .billing
        .collect_gateway_payment(&ctx, company_id, gateway, &request)
        .await?;
    Ok(Json(GatewayPaymentResponse { response, payment }))
}

pub async fn search_transaction(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(name): Path<String>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<GatewayResponse>, ApiError> {
    let company_id = target_company(&ctx, scope.company_id)?;
    let gateway = state.gateways.get(&name)?;
    Ok(Json(gateway.search_transaction(&ctx, company_id, &request.trx_id).await?))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<GatewayTransactionLog>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TRANSACTION_LIST);
    let rows = state
        .gateway_audit
        .list(&ctx, query.gateway.as_deref(), limit)
        .await?;
    Ok(Json(rows))
}
