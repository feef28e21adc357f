//! API middleware
//!
//! Layered outermost first: tenant resolution, authentication, audit.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::TenantContext;
use domain_reseller::Principal;

use crate::auth::{authorize_tenant, validate_token};
use crate::error::ApiError;
use crate::AppState;

/// Tenant resolution middleware
///
/// Resolves the `Host` header to a `TenantContext` and stores it in the
/// request extensions. Unknown hosts get 404 before any handler runs.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("missing Host header".to_string()))?;

    let ctx = state.resolver.resolve(&host).await?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Authentication middleware
///
/// Validates the bearer token and checks the user belongs to the resolved
/// tenant. The `Principal` is stored in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            warn!("Missing or invalid Authorization header");
            ApiError::Unauthorized
        })?;

    let claims = validate_token(token, &state.config.jwt_secret).map_err(|e| {
        warn!("Token validation failed: {:?}", e);
        ApiError::from(e)
    })?;
    let principal = claims.principal();

    let ctx = request
        .extensions()
        .get::<TenantContext>()
        .copied()
        .unwrap_or_default();
    authorize_tenant(&principal, &ctx)?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Logs every API request with its tenant, user, status and duration
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let tenant = match request.extensions().get::<TenantContext>() {
        Some(TenantContext::Tenant(company_id)) => company_id.to_string(),
        Some(TenantContext::SuperAdmin) => "super_admin".to_string(),
        _ => "none".to_string(),
    };
    let user_id = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.user_id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        tenant = %tenant,
        user = %user_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
