//! Customer and package handlers, with the per-customer billing actions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{CustomerId, TenantContext};
use domain_billing::{Customer, CustomerQuery, CustomerUpdate, ExpiryOutcome, NewCustomer, NewPackage, Package};
use domain_reseller::{Principal, RechargeOutcome};

use super::target_company;
use crate::dto::billing::{CustomerInvoiceResponse, CustomerListQuery, ExpiryResponse, PaymentTypeRequest};
use crate::dto::CompanyScope;
use crate::{error::ApiError, AppState};

pub async fn create_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let company_id = target_company(&ctx, scope.company_id)?;
    let customer = state.customers.create_customer(&ctx, company_id, request).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<CustomerListQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let query = CustomerQuery {
        status: query.status,
        reseller_id: query.reseller_id,
        limit: query.limit,
        ..Default::default()
    };
    Ok(Json(state.customers.list_customers(&ctx, &query).await?))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.customers.get_customer(&ctx, id).await?))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CustomerId>,
    Json(update): Json<CustomerUpdate>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.customers.update_customer(&ctx, id, update).await?))
}

/// Issues this cycle's invoice for one customer
pub async fn generate_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CustomerId>,
) -> Result<Json<CustomerInvoiceResponse>, ApiError> {
    let invoice = state.billing.generate_invoice_for_customer(&ctx, id).await?;
    Ok(Json(CustomerInvoiceResponse {
        customer_id: id,
        invoice,
    }))
}

pub async fn extend_expiry(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CustomerId>,
    Json(request): Json<PaymentTypeRequest>,
) -> Result<Json<ExpiryResponse>, ApiError> {
    let expiry_date = state
        .billing
        .extend_customer_expiry(&ctx, id, request.payment_type)
        .await?;
    Ok(Json(ExpiryResponse {
        customer_id: id,
        expiry_date,
    }))
}

pub async fn process_expiry(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<CustomerId>,
) -> Result<Json<ExpiryOutcome>, ApiError> {
    Ok(Json(state.billing.process_customer_expiry(&ctx, id).await?))
}

/// Recharges a customer from the caller's balance (resellers) or without
/// one (staff)
pub async fn recharge_customer(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<CustomerId>,
    Json(request): Json<PaymentTypeRequest>,
) -> Result<Json<RechargeOutcome>, ApiError> {
    let outcome = state
        .recharge
        .recharge_customer(&ctx, &principal, id, request.payment_type)
        .await?;
    Ok(Json(outcome))
}

pub async fn create_package(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<NewPackage>,
) -> Result<(StatusCode, Json<Package>), ApiError> {
    let company_id = target_company(&ctx, scope.company_id)?;
    let package = state.customers.create_package(&ctx, company_id, request).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

pub async fn list_packages(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<Vec<Package>>, ApiError> {
    Ok(Json(state.customers.list_packages(&ctx).await?))
}
