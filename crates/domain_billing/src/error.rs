//! Billing domain errors

use rust_decimal::Decimal;
use thiserror::Error;
use validator::ValidationErrors;

use core_kernel::{MoneyError, PortError, TemporalError, TenancyError};
use domain_integrations::IntegrationError;
use domain_tenancy::CompanyError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Input failed validation; nothing was written
    #[error("Validation error: {0}")]
    Validation(String),

    /// Customer not found
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Package not found
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Invoice cannot accept further payments
    #[error("Invoice {invoice_number} is {status} and cannot be reconciled")]
    InvoiceClosed {
        invoice_number: String,
        status: String,
    },

    /// Username or email already registered in the company
    #[error("Duplicate {field}: {value}")]
    Duplicate {
        field: &'static str,
        value: String,
    },

    /// Non-positive payment amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error("Calculation error: {0}")]
    Calculation(String),

    /// External collaborator failure surfaced to the caller
    #[error("Integration error: {0}")]
    Integration(String),

    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for BillingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Tenancy(err) => BillingError::Tenancy(err),
            PortError::Validation { message, .. } => BillingError::Validation(message),
            PortError::NotFound { entity_type, id } => match entity_type.as_str() {
                "Customer" => BillingError::CustomerNotFound(id),
                "Package" => BillingError::PackageNotFound(id),
                "Invoice" => BillingError::InvoiceNotFound(id),
                _ => BillingError::Port(PortError::NotFound { entity_type, id }),
            },
            other => BillingError::Port(other),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::NonPositive(amount) => BillingError::InvalidAmount(amount),
            other => BillingError::Calculation(other.to_string()),
        }
    }
}

impl From<TemporalError> for BillingError {
    fn from(err: TemporalError) -> Self {
        BillingError::Calculation(err.to_string())
    }
}

impl From<CompanyError> for BillingError {
    fn from(err: CompanyError) -> Self {
        match err {
            CompanyError::Tenancy(err) => BillingError::Tenancy(err),
            CompanyError::Port(err) => BillingError::Port(err),
            other => BillingError::Validation(other.to_string()),
        }
    }
}

impl From<IntegrationError> for BillingError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::Port(err) => BillingError::from(err),
            other => BillingError::Integration(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for BillingError {
    fn from(errors: ValidationErrors) -> Self {
        BillingError::Validation(validation_messages(&errors).join(", "))
    }
}

/// Flattens field errors into `"field: code"` messages, sorted by field
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{}: {}", field, message),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    messages.sort();
    messages
}

impl BillingError {
    /// Returns true for expected business outcomes that should be logged below `error`
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            BillingError::Validation(_)
                | BillingError::Duplicate { .. }
                | BillingError::InvoiceClosed { .. }
                | BillingError::InvalidAmount(_)
        )
    }
}
