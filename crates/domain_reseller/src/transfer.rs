//! Fund transfer audit trail
//!
//! Every balance movement writes exactly one `FundTransfer`. Rows are
//! append-only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CompanyId, FundTransferId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    FromAdminToReseller,
    ResellerToEmployee,
    ResellerCommissionPayouts,
    ResellerRecharge,
    EmployeeRecharge,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::FromAdminToReseller => "from_admin_to_reseller",
            TransferType::ResellerToEmployee => "reseller_to_employee",
            TransferType::ResellerCommissionPayouts => "reseller_commission_payouts",
            TransferType::ResellerRecharge => "reseller_recharge",
            TransferType::EmployeeRecharge => "employee_recharge",
        }
    }
}

impl std::str::FromStr for TransferType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from_admin_to_reseller" => Ok(TransferType::FromAdminToReseller),
            "reseller_to_employee" => Ok(TransferType::ResellerToEmployee),
            "reseller_commission_payouts" => Ok(TransferType::ResellerCommissionPayouts),
            "reseller_recharge" => Ok(TransferType::ResellerRecharge),
            "employee_recharge" => Ok(TransferType::EmployeeRecharge),
            other => Err(format!("unknown transfer type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundTransfer {
    pub id: FundTransferId,
    pub company_id: CompanyId,
    pub transfer_type: TransferType,
    pub amount: Decimal,
    /// Debited user; `None` when funds enter from outside the ledger
    pub from_user_id: Option<UserId>,
    /// Credited user; `None` when funds leave the ledger
    pub to_user_id: Option<UserId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FundTransfer {
    pub fn new(
        company_id: CompanyId,
        transfer_type: TransferType,
        amount: Decimal,
        from_user_id: Option<UserId>,
        to_user_id: Option<UserId>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: FundTransferId::new_v7(),
            company_id,
            transfer_type,
            amount,
            from_user_id,
            to_user_id,
            notes,
            created_at: Utc::now(),
        }
    }

    /// Credit of summed commissions to a reseller
    pub fn commission_payout(company_id: CompanyId, reseller_id: UserId, amount: Decimal, count: usize) -> Self {
        Self::new(
            company_id,
            TransferType::ResellerCommissionPayouts,
            amount,
            None,
            Some(reseller_id),
            Some(format!("Commission payout ({} commissions)", count)),
        )
    }

    pub fn involves(&self, user_id: UserId) -> bool {
        self.from_user_id == Some(user_id) || self.to_user_id == Some(user_id)
    }
}
