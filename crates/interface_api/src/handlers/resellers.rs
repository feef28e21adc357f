//! Reseller balance, transfer, commission and payout handlers
//!
//! Funding, payouts and rate changes are admin actions. A reseller may read
//! their own balance and history and transfer to their employees.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{TenantContext, UserId};
use domain_billing::ResellerCommission;
use domain_reseller::{FundTransfer, PayoutSummary, Principal, ResellerBalance};

use super::target_company;
use crate::auth::{require_admin, AuthError};
use crate::dto::billing::CommissionRateRequest;
use crate::dto::reseller::{CommissionListQuery, FundRequest, PayoutRequest, TransferRequest, TransferResponse};
use crate::dto::{CompanyScope, LimitQuery};
use crate::{error::ApiError, AppState};

/// Admins act on anyone; everyone else only on themselves
fn require_self_or_admin(principal: &Principal, user_id: UserId) -> Result<(), AuthError> {
    if principal.user_id == user_id {
        Ok(())
    } else {
        require_admin(principal)
    }
}

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<ResellerBalance>, ApiError> {
    require_self_or_admin(&principal, user_id)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    Ok(Json(state.ledger.get_reseller_balance(&ctx, company_id, user_id).await?))
}

/// Credits a reseller from the company (admin funding)
pub async fn fund_reseller(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<FundRequest>,
) -> Result<Json<ResellerBalance>, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    let balance = state
        .ledger
        .add_reseller_balance(&ctx, company_id, user_id, request.amount, principal.user_id, request.note)
        .await?;
    Ok(Json(balance))
}

pub async fn transfer_to_employee(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    require_self_or_admin(&principal, user_id)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    let (reseller, employee) = state
        .ledger
        .transfer_to_employee(&ctx, company_id, user_id, request.employee_id, request.amount, request.notes)
        .await?;
    Ok(Json(TransferResponse { reseller, employee }))
}

pub async fn transfer_history(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<FundTransfer>>, ApiError> {
    require_self_or_admin(&principal, user_id)?;
    Ok(Json(state.ledger.transfer_history(&ctx, user_id, query.limit).await?))
}

pub async fn list_commissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(query): Query<CommissionListQuery>,
) -> Result<Json<Vec<ResellerCommission>>, ApiError> {
    require_self_or_admin(&principal, user_id)?;
    let commissions = state
        .billing
        .store()
        .list_commissions(&ctx, Some(user_id), query.status)
        .await?;
    Ok(Json(commissions))
}

pub async fn set_commission_rate(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<CommissionRateRequest>,
) -> Result<StatusCode, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    state
        .customers
        .set_commission_percent(&ctx, company_id, user_id, request.commission_percent)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pays out (`immediate`) or releases for payout the pending commissions
pub async fn payout_commission(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<PayoutRequest>,
) -> Result<Json<PayoutSummary>, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    let summary = state
        .ledger
        .payout_commission(&ctx, company_id, user_id, request.immediate)
        .await?;
    Ok(Json(summary))
}

/// Credits the commissions already released for payout
pub async fn settle_commissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<UserId>,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<PayoutSummary>, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    Ok(Json(state.ledger.settle_ready_commissions(&ctx, company_id, user_id).await?))
}
