//! Reseller commission accrual
//!
//! A commission row is written once per payment taken from a reseller's
//! customer. The rate is copied onto the row at that moment, so later rate
//! changes never rewrite history. Only `status` and `paid_at` change after
//! insert.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{percent_of, CommissionId, CompanyId, CustomerId, MoneyError, PaymentId, UserId};

use crate::customer::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Pending,
    ReadyForPayout,
    Paid,
}

string_enum!(CommissionStatus {
    Pending => "pending",
    ReadyForPayout => "ready_for_payout",
    Paid => "paid",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResellerCommission {
    pub id: CommissionId,
    pub company_id: CompanyId,
    pub reseller_id: UserId,
    pub customer_id: CustomerId,
    pub payment_id: Option<PaymentId>,
    /// Package price excluding VAT
    pub base_amount: Decimal,
    /// Rate in force when the payment was taken
    pub commission_percent: Decimal,
    pub commission_amount: Decimal,
    pub status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ResellerCommission {
    /// Accrues a pending commission of `base_amount × percent / 100`
    pub fn accrue(
        company_id: CompanyId,
        reseller_id: UserId,
        customer_id: CustomerId,
        payment_id: Option<PaymentId>,
        base_amount: Decimal,
        commission_percent: Decimal,
    ) -> Result<Self, MoneyError> {
        let commission_amount = percent_of(base_amount, commission_percent)?;
        Ok(Self {
            id: CommissionId::new_v7(),
            company_id,
            reseller_id,
            customer_id,
            payment_id,
            base_amount,
            commission_percent,
            commission_amount,
            status: CommissionStatus::Pending,
            paid_at: None,
            created_at: Utc::now(),
        })
    }
}

/// A reseller's commission settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResellerProfile {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub commission_percent: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_accrue_snapshots_rate() {
        let c = ResellerCommission::accrue(
            CompanyId::new(),
            UserId::new(),
            CustomerId::new(),
            None,
            dec!(1000.00),
            dec!(10),
        )
        .unwrap();
        assert_eq!(c.commission_amount, dec!(100.00));
        assert_eq!(c.commission_percent, dec!(10));
        assert_eq!(c.status, CommissionStatus::Pending);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(CommissionStatus::ReadyForPayout.as_str(), "ready_for_payout");
        assert_eq!("paid".parse::<CommissionStatus>().unwrap(), CommissionStatus::Paid);
    }
}
