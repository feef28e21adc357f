//! Tenancy domain errors

use thiserror::Error;
use validator::ValidationErrors;

use core_kernel::{PortError, TenancyError};

/// Errors that can occur while managing or resolving companies
#[derive(Debug, Error)]
pub enum CompanyError {
    /// Request failed field validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Domain or subdomain already belongs to another company
    #[error("Domain or subdomain already exists: {0}")]
    HostKeyTaken(String),

    /// Company not found
    #[error("Company not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for CompanyError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => {
                CompanyError::NotFound(format!("{} {}", entity_type, id))
            }
            PortError::Tenancy(err) => CompanyError::Tenancy(err),
            other => CompanyError::Port(other),
        }
    }
}

impl From<ValidationErrors> for CompanyError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let codes: Vec<_> = errs.iter().map(|e| e.code.to_string()).collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect();
        messages.sort();
        CompanyError::Validation(messages.join("; "))
    }
}
