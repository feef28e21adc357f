//! Reseller Domain - prepaid balances and the fund-transfer ledger
//!
//! Resellers are company-scoped sub-agents. Each holds a prepaid balance
//! (as does each of their employees) that is never allowed to go negative.
//!
//! Balance movements:
//!
//! | Movement                     | Debit    | Credit   | Transfer type                 |
//! |------------------------------|----------|----------|-------------------------------|
//! | Admin funding                | -        | reseller | `from_admin_to_reseller`      |
//! | Reseller to employee         | reseller | employee | `reseller_to_employee`        |
//! | Commission payout/settlement | -        | reseller | `reseller_commission_payouts` |
//! | Recharge by reseller         | reseller | -        | `reseller_recharge`           |
//! | Recharge by employee         | employee | -        | `employee_recharge`           |
//!
//! Every movement is applied atomically by the `LedgerStore` together with
//! its `FundTransfer` audit row.

pub mod balance;
pub mod error;
pub mod ledger;
pub mod ports;
pub mod principal;
pub mod recharge;
pub mod transfer;

pub use balance::ResellerBalance;
pub use error::LedgerError;
pub use ledger::{LedgerService, PayoutSummary, DEFAULT_HISTORY_LIMIT};
pub use ports::{
    BalanceMovement, CommissionSettlement, LedgerStore, MovementResult, RechargeRecord, RechargeResult, SettlementResult,
};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockLedgerStore;
pub use principal::{Principal, Role};
pub use recharge::{RechargeOutcome, RechargeService};
pub use transfer::{FundTransfer, TransferType};
