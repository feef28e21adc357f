//! API error handling
//!
//! Domain errors are folded into `ApiError` at the handler boundary. Tenant
//! violations always surface as 403 and are never downgraded; an
//! insufficient balance is an ordinary 422 and logged at `info`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use core_kernel::{PortError, TenancyError};
use domain_billing::BillingError;
use domain_bulk::BulkError;
use domain_integrations::IntegrationError;
use domain_reseller::LedgerError;
use domain_support::SupportError;
use domain_tenancy::CompanyError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A well-formed request the business rules refuse
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "unprocessable", msg.clone()),
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone()),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<TenancyError> for ApiError {
    fn from(err: TenancyError) -> Self {
        match err {
            TenancyError::TenantNotFound(_) => ApiError::NotFound(err.to_string()),
            TenancyError::CrossTenantViolation { .. } => {
                warn!(error = %err, "cross-tenant write rejected");
                ApiError::Forbidden(err.to_string())
            }
            TenancyError::ContextMissing | TenancyError::SuperAdminRequired => ApiError::Forbidden(err.to_string()),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Tenancy(err) => err.into(),
            PortError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            PortError::Validation { message, .. } => ApiError::Validation(message),
            PortError::Conflict { message } => ApiError::Conflict(message),
            PortError::Connection { .. } | PortError::Timeout { .. } | PortError::ServiceUnavailable { .. } => {
                ApiError::Unavailable(err.to_string())
            }
            PortError::Internal { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CompanyError> for ApiError {
    fn from(err: CompanyError) -> Self {
        match err {
            CompanyError::Validation(msg) => ApiError::Validation(msg),
            CompanyError::HostKeyTaken(_) => ApiError::Conflict(err.to_string()),
            CompanyError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CompanyError::Tenancy(err) => err.into(),
            CompanyError::Port(err) => err.into(),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(msg) => ApiError::Validation(msg),
            BillingError::CustomerNotFound(_) | BillingError::PackageNotFound(_) | BillingError::InvoiceNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            BillingError::InvoiceClosed { .. } | BillingError::Duplicate { .. } => ApiError::Conflict(err.to_string()),
            BillingError::InvalidAmount(_) => ApiError::Unprocessable(err.to_string()),
            BillingError::Tenancy(err) => err.into(),
            BillingError::Integration(_) => ApiError::Unavailable(err.to_string()),
            BillingError::Calculation(_) => ApiError::Internal(err.to_string()),
            BillingError::Port(err) => err.into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { .. } => {
                info!(error = %err, "balance check failed");
                ApiError::Unprocessable(err.to_string())
            }
            LedgerError::InvalidAmount(_) | LedgerError::InvalidTransfer(_) => ApiError::Unprocessable(err.to_string()),
            LedgerError::Tenancy(err) => err.into(),
            LedgerError::Billing(err) => err.into(),
            LedgerError::Calculation(_) => ApiError::Internal(err.to_string()),
            LedgerError::Port(err) => err.into(),
        }
    }
}

impl From<BulkError> for ApiError {
    fn from(err: BulkError) -> Self {
        match err {
            BulkError::Validation(msg) => ApiError::Validation(msg),
            BulkError::Csv(msg) => ApiError::BadRequest(msg),
            BulkError::Tenancy(err) => err.into(),
            BulkError::Billing(err) => err.into(),
            BulkError::Port(err) => err.into(),
        }
    }
}

impl From<SupportError> for ApiError {
    fn from(err: SupportError) -> Self {
        match err {
            SupportError::Validation(msg) => ApiError::Validation(msg),
            SupportError::InvalidTransition { .. } | SupportError::TicketClosed(_) => {
                ApiError::Unprocessable(err.to_string())
            }
            SupportError::NotFound(_) => ApiError::NotFound(err.to_string()),
            SupportError::Tenancy(err) => err.into(),
            SupportError::Port(err) => err.into(),
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::GatewayNotConfigured(_) => ApiError::NotFound(err.to_string()),
            IntegrationError::Port(err) => err.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken | AuthError::TokenExpired => ApiError::Unauthorized,
            AuthError::MissingRole(_) | AuthError::WrongCompany => ApiError::Forbidden(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{CompanyId, TicketId, UserId};
    use domain_support::TicketStatus;
    use rust_decimal::Decimal;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_cross_tenant_is_forbidden_through_every_layer() {
        let violation = TenancyError::CrossTenantViolation {
            active: CompanyId::new(),
            owner: CompanyId::new(),
        };
        assert_eq!(status(violation.clone()), StatusCode::FORBIDDEN);
        assert_eq!(status(PortError::Tenancy(violation.clone())), StatusCode::FORBIDDEN);
        assert_eq!(status(BillingError::Tenancy(violation.clone())), StatusCode::FORBIDDEN);
        assert_eq!(status(LedgerError::Tenancy(violation)), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_insufficient_balance_is_unprocessable() {
        let err = LedgerError::InsufficientBalance {
            user_id: UserId::new(),
            available: Decimal::ONE,
            requested: Decimal::TEN,
        };
        assert_eq!(status(err), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unknown_tenant_is_not_found() {
        assert_eq!(
            status(CompanyError::Tenancy(TenancyError::TenantNotFound("x.example.com".into()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_ticket_workflow_errors_are_unprocessable() {
        let err = SupportError::InvalidTransition {
            from: TicketStatus::InProgress,
            to: TicketStatus::Open,
        };
        assert_eq!(status(err), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(SupportError::TicketClosed(TicketId::new())), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status(SupportError::Port(PortError::conflict("moved"))), StatusCode::CONFLICT);
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let err = BillingError::Duplicate {
            field: "username",
            value: "rahim".to_string(),
        };
        assert_eq!(status(err), StatusCode::CONFLICT);
    }
}
