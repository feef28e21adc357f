//! Reseller ledger DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::UserId;
use domain_billing::CommissionStatus;
use domain_reseller::ResellerBalance;

/// Admin funding of a reseller
#[derive(Debug, Deserialize)]
pub struct FundRequest {
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub employee_id: UserId,
    pub amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub reseller: ResellerBalance,
    pub employee: ResellerBalance,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayoutRequest {
    #[serde(default)]
    pub immediate: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommissionListQuery {
    pub status: Option<CommissionStatus>,
}
