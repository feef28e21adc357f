//! HTTP API Layer
//!
//! This crate provides the REST API and scheduled jobs for the billing
//! platform using Axum.
//!
//! # Architecture
//!
//! - **Middleware**: tenant resolution from the `Host` header, JWT
//!   authentication, audit logging
//! - **Handlers**: thin adapters from HTTP to the domain services
//! - **DTOs**: request/response bodies that differ from the domain types
//! - **Jobs**: the scheduled sweeps run by `isp-billing-jobs`
//! - **Error Handling**: consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState, Ports};
//!
//! let state = AppState::new(config.clone(), Ports::postgres(pool, &config)?, GatewayRegistry::new());
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod startup;
pub mod state;

use axum::{
    http::HeaderName,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{billing, bulk, companies, customers, gateways, health, resellers, support};
use crate::middleware::{audit_middleware, auth_middleware, tenant_middleware};

pub use crate::state::{AppState, Ports};

/// Header carrying the per-request id, generated when the caller sends none
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Creates the main API router
///
/// Everything under `/api/v1` requires a resolvable host and a valid token.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no tenant, no auth)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let company_routes = Router::new()
        .route("/", get(companies::list_companies).post(companies::create_company))
        .route("/:id", get(companies::get_company).put(companies::update_company))
        .route("/:id/enable", post(companies::enable_company))
        .route("/:id/disable", post(companies::disable_company));

    let customer_routes = Router::new()
        .route("/", get(customers::list_customers).post(customers::create_customer))
        .route("/:id", get(customers::get_customer).put(customers::update_customer))
        .route("/:id/invoice", post(customers::generate_invoice))
        .route("/:id/extend-expiry", post(customers::extend_expiry))
        .route("/:id/process-expiry", post(customers::process_expiry))
        .route("/:id/recharge", post(customers::recharge_customer));

    let package_routes = Router::new().route("/", get(customers::list_packages).post(customers::create_package));

    let invoice_routes = Router::new()
        .route("/", get(billing::list_invoices))
        .route("/generate", post(billing::generate_invoices))
        .route("/:id", get(billing::get_invoice));

    let payment_routes = Router::new().route("/", get(billing::list_payments).post(billing::create_payment));

    let reseller_routes = Router::new()
        .route("/:id/balance", get(resellers::get_balance).post(resellers::fund_reseller))
        .route(
            "/:id/transfers",
            get(resellers::transfer_history).post(resellers::transfer_to_employee),
        )
        .route("/:id/commissions", get(resellers::list_commissions))
        .route("/:id/commission-rate", put(resellers::set_commission_rate))
        .route("/:id/payout", post(resellers::payout_commission))
        .route("/:id/settle", post(resellers::settle_commissions));

    let bulk_routes = Router::new()
        .route("/", post(bulk::execute))
        .route("/imports", get(bulk::list_imports).post(bulk::import_customers))
        .route("/imports/:id", get(bulk::get_import));

    let gateway_routes = Router::new()
        .route("/", get(gateways::list_gateways))
        .route("/transactions", get(gateways::list_transactions))
        .route("/:name/check-bill", post(gateways::check_bill))
        .route("/:name/payment", post(gateways::process_payment))
        .route("/:name/search", post(gateways::search_transaction));

    let ticket_routes = Router::new()
        .route("/", get(support::list_tickets).post(support::open_ticket))
        .route("/stats", get(support::ticket_stats))
        .route("/:id", get(support::get_ticket))
        .route("/:id/assign", post(support::assign_ticket))
        .route("/:id/status", post(support::change_status))
        .route("/:id/comments", post(support::add_comment))
        .route("/:id/logs", get(support::ticket_logs));

    // Protected API routes; the last layer added runs first
    let api_routes = Router::new()
        .nest("/companies", company_routes)
        .nest("/customers", customer_routes)
        .nest("/packages", package_routes)
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .route("/expirations/process", post(billing::process_expirations))
        .nest("/resellers", reseller_routes)
        .nest("/bulk", bulk_routes)
        .nest("/gateways", gateway_routes)
        .nest("/tickets", ticket_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), tenant_middleware));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
