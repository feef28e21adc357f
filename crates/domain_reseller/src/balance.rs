//! Prepaid balances

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::money::{checked_add, checked_sub};
use core_kernel::{ensure_positive, CompanyId, UserId};

use crate::error::LedgerError;

/// Balance of one reseller (or reseller employee) within a company
///
/// Never negative: a debit larger than the balance is rejected and leaves
/// the balance as it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResellerBalance {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub balance: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ResellerBalance {
    /// A zero balance
    pub fn open(company_id: CompanyId, user_id: UserId) -> Self {
        Self {
            user_id,
            company_id,
            balance: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    pub fn covers(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    pub fn credit(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        let amount = ensure_positive(amount)?;
        self.balance = checked_add(self.balance, amount)?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    pub fn debit(&mut self, amount: Decimal) -> Result<Decimal, LedgerError> {
        let amount = ensure_positive(amount)?;
        if !self.covers(amount) {
            return Err(LedgerError::InsufficientBalance {
                user_id: self.user_id,
                available: self.balance,
                requested: amount,
            });
        }
        self.balance = checked_sub(self.balance, amount)?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }
}
