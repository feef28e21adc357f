//! Invoice, payment and expiry sweep handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{InvoiceId, TenantContext};
use domain_billing::{ExpirationSummary, Invoice, InvoiceQuery, NewPayment, Payment, PaymentOutcome};
use domain_reseller::Principal;

use super::target_company;
use crate::auth::require_admin;
use crate::dto::billing::{CreatePaymentRequest, InvoiceListQuery, PaymentListQuery};
use crate::dto::{CompanyScope, CountResponse};
use crate::{error::ApiError, AppState};

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<InvoiceListQuery>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let query = InvoiceQuery {
        customer_id: query.customer_id,
        status: query.status,
        limit: query.limit,
    };
    Ok(Json(state.billing.store().list_invoices(&ctx, &query).await?))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.billing.store().get_invoice(&ctx, id).await?))
}

/// Runs the invoice sweep for a company
pub async fn generate_invoices(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<CountResponse>, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    let count = state.billing.generate_invoices_for_company(&ctx, company_id).await?;
    Ok(Json(CountResponse { count }))
}

/// Runs the expiry sweep for a company
pub async fn process_expirations(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Query(scope): Query<CompanyScope>,
) -> Result<Json<ExpirationSummary>, ApiError> {
    require_admin(&principal)?;
    let company_id = target_company(&ctx, scope.company_id)?;
    Ok(Json(state.billing.process_expirations_for_company(&ctx, company_id).await?))
}

/// Records a payment taken by the calling operator
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentOutcome>), ApiError> {
    let mut payment = NewPayment::new(request.customer_id, request.amount, request.payment_method)
        .by_operator(principal.user_id);
    if let Some(invoice_id) = request.invoice_id {
        payment = payment.for_invoice(invoice_id);
    }
    payment.transaction_id = request.transaction_id;

    let outcome = state.billing.process_payment(&ctx, payment).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(query): Query<PaymentListQuery>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.billing.store().list_payments(&ctx, query.customer_id).await?))
}
