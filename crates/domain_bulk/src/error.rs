//! Bulk operation errors

use thiserror::Error;

use core_kernel::{PortError, TenancyError};
use domain_billing::BillingError;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The file could not be read as CSV at all
    #[error("CSV error: {0}")]
    Csv(String),

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error(transparent)]
    Billing(BillingError),

    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for BulkError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Tenancy(err) => BulkError::Tenancy(err),
            other => BulkError::Port(other),
        }
    }
}

impl From<BillingError> for BulkError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Tenancy(err) => BulkError::Tenancy(err),
            other => BulkError::Billing(other),
        }
    }
}

impl From<csv::Error> for BulkError {
    fn from(err: csv::Error) -> Self {
        BulkError::Csv(err.to_string())
    }
}
