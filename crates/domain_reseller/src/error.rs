//! Reseller ledger errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{MoneyError, PortError, TenancyError, UserId};
use domain_billing::BillingError;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The debited balance does not cover the amount; nothing was changed
    #[error("Insufficient balance for {user_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        user_id: UserId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error(transparent)]
    Billing(BillingError),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for LedgerError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Tenancy(err) => LedgerError::Tenancy(err),
            other => LedgerError::Port(other),
        }
    }
}

impl From<BillingError> for LedgerError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Tenancy(err) => LedgerError::Tenancy(err),
            other => LedgerError::Billing(other),
        }
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        match err {
            MoneyError::NonPositive(amount) => LedgerError::InvalidAmount(amount),
            other => LedgerError::Calculation(other.to_string()),
        }
    }
}

impl LedgerError {
    /// Expected business failures, logged at `info`
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientBalance { .. }
                | LedgerError::InvalidAmount(_)
                | LedgerError::InvalidTransfer(_)
        )
    }
}
