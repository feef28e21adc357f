//! Reseller Ledger Ports
//!
//! Every write method is one atomic unit: row locks on the balances it
//! touches, debit before credit, and the `FundTransfer` row, all committed
//! together or not at all. A recharge extends that unit over the billing
//! tables it writes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use core_kernel::{CompanyId, CustomerId, DomainPort, HealthCheckable, PortError, TenantContext, UserId};
use domain_billing::{CommissionStatus, Payment, PaymentRecord};

use crate::balance::ResellerBalance;
use crate::transfer::FundTransfer;

/// A balance movement between at most two users
#[derive(Debug, Clone)]
pub struct BalanceMovement {
    pub company_id: CompanyId,
    pub debit: Option<UserId>,
    pub credit: Option<UserId>,
    pub amount: Decimal,
    pub transfer: FundTransfer,
}

/// What the store did with a movement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementResult {
    Applied {
        debited: Option<ResellerBalance>,
        credited: Option<ResellerBalance>,
    },
    /// The debited balance was short; nothing was written
    Insufficient { user_id: UserId, available: Decimal },
}

/// Writes that make up one customer recharge, applied atomically
///
/// The debit and its transfer, the payment with its commission, and the
/// customer's new expiry commit together. `new_expiry` was computed from
/// `previous_expiry`; if the stored expiry no longer matches, the store
/// fails with `Conflict` and writes nothing.
#[derive(Debug, Clone)]
pub struct RechargeRecord {
    /// `None` for principals who recharge without a balance
    pub debit: Option<BalanceMovement>,
    pub payment: PaymentRecord,
    pub customer_id: CustomerId,
    pub previous_expiry: Option<NaiveDate>,
    pub new_expiry: NaiveDate,
}

/// What the store did with a recharge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RechargeResult {
    Applied {
        balance: Option<ResellerBalance>,
        payment: Payment,
    },
    /// The debited balance was short; nothing was written
    Insufficient { user_id: UserId, available: Decimal },
}

/// Moves a reseller's commissions from one status to another
#[derive(Debug, Clone)]
pub struct CommissionSettlement {
    pub company_id: CompanyId,
    pub reseller_id: UserId,
    pub from_status: CommissionStatus,
    pub to_status: CommissionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// Credit the summed amount to the reseller and record a payout transfer
    pub credit: bool,
}

/// Totals of a settlement; `count == 0` means nothing was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementResult {
    pub count: usize,
    pub total: Decimal,
    pub balance: Option<ResellerBalance>,
    pub transfer: Option<FundTransfer>,
}

impl SettlementResult {
    pub fn empty() -> Self {
        Self {
            count: 0,
            total: Decimal::ZERO,
            balance: None,
            transfer: None,
        }
    }
}

/// Storage port for balances, transfers, and commission settlement
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Returns the user's balance, creating a zero balance if none exists
    async fn get_or_create_balance(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<ResellerBalance, PortError>;

    async fn apply_movement(
        &self,
        ctx: &TenantContext,
        movement: &BalanceMovement,
    ) -> Result<MovementResult, PortError>;

    async fn apply_recharge(&self, ctx: &TenantContext, recharge: &RechargeRecord)
        -> Result<RechargeResult, PortError>;

    async fn settle_commissions(
        &self,
        ctx: &TenantContext,
        settlement: &CommissionSettlement,
    ) -> Result<SettlementResult, PortError>;

    /// Resellers of a company with at least one commission in `status`
    async fn resellers_with_commissions(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        status: CommissionStatus,
    ) -> Result<Vec<UserId>, PortError>;

    /// Transfers from or to a user, newest first
    async fn list_transfers(
        &self,
        ctx: &TenantContext,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<FundTransfer>, PortError>;
}

/// In-memory adapter for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, CommissionId, HealthCheckResult};
    use domain_billing::ports::mock::Shared;
    use domain_billing::{BillingStore, MockBillingStore, ResellerCommission};

    /// In-memory mock implementation of LedgerStore
    ///
    /// Built over a `MockBillingStore` so accrued commissions are visible
    /// to payouts and recharges land in the billing tables.
    ///
    /// Guards are taken in one order: balances, customers, the billing
    /// tables, commissions, transfers.
    #[derive(Debug, Default, Clone)]
    pub struct MockLedgerStore {
        pub balances: Shared<(CompanyId, UserId), ResellerBalance>,
        pub transfers: Arc<RwLock<Vec<FundTransfer>>>,
        pub commissions: Shared<CommissionId, ResellerCommission>,
        billing: MockBillingStore,
    }

    impl MockLedgerStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_billing(billing: &MockBillingStore) -> Self {
            Self {
                commissions: billing.commissions.clone(),
                billing: billing.clone(),
                ..Self::default()
            }
        }

        pub async fn transfers(&self) -> Vec<FundTransfer> {
            self.transfers.read().await.clone()
        }
    }

    impl DomainPort for MockLedgerStore {}

    #[async_trait]
    impl HealthCheckable for MockLedgerStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-ledger-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for MockLedgerStore {
        async fn get_or_create_balance(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
            user_id: UserId,
        ) -> Result<ResellerBalance, PortError> {
            let company_id = ctx.stamp(company_id)?;
            let mut balances = self.balances.write().await;
            Ok(balances
                .entry((company_id, user_id))
                .or_insert_with(|| ResellerBalance::open(company_id, user_id))
                .clone())
        }

        async fn apply_movement(
            &self,
            ctx: &TenantContext,
            movement: &BalanceMovement,
        ) -> Result<MovementResult, PortError> {
            let company_id = ctx.stamp(movement.company_id)?;
            let mut balances = self.balances.write().await;

            // Sufficiency is checked before any balance is written
            let debited = match movement.debit {
                Some(user_id) => {
                    let mut balance = balances
                        .get(&(company_id, user_id))
                        .cloned()
                        .unwrap_or_else(|| ResellerBalance::open(company_id, user_id));
                    if !balance.covers(movement.amount) {
                        return Ok(MovementResult::Insufficient {
                            user_id,
                            available: balance.balance,
                        });
                    }
                    balance.balance -= movement.amount;
                    balance.updated_at = Utc::now();
                    balances.insert((company_id, user_id), balance.clone());
                    Some(balance)
                }
                None => None,
            };
            let credited = match movement.credit {
                Some(user_id) => {
                    let balance = balances
                        .entry((company_id, user_id))
                        .or_insert_with(|| ResellerBalance::open(company_id, user_id));
                    balance.balance += movement.amount;
                    balance.updated_at = Utc::now();
                    Some(balance.clone())
                }
                None => None,
            };

            let mut transfer = movement.transfer.clone();
            transfer.company_id = company_id;
            self.transfers.write().await.push(transfer);

            Ok(MovementResult::Applied { debited, credited })
        }

        async fn apply_recharge(
            &self,
            ctx: &TenantContext,
            recharge: &RechargeRecord,
        ) -> Result<RechargeResult, PortError> {
            let mut balances = self.balances.write().await;
            let mut customers = self.billing.customers.write().await;

            let customer = customers
                .get_mut(&recharge.customer_id)
                .ok_or_else(|| PortError::not_found("Customer", recharge.customer_id))?;
            ctx.authorize_write(customer.company_id)?;
            if customer.expiry_date != recharge.previous_expiry {
                return Err(PortError::conflict(format!(
                    "expiry of customer {} changed during recharge",
                    recharge.customer_id
                )));
            }

            // Every check runs before the first write
            let debited = match &recharge.debit {
                Some(BalanceMovement {
                    company_id,
                    debit: Some(user_id),
                    amount,
                    transfer,
                    ..
                }) => {
                    let company_id = ctx.stamp(*company_id)?;
                    let mut balance = balances
                        .get(&(company_id, *user_id))
                        .cloned()
                        .unwrap_or_else(|| ResellerBalance::open(company_id, *user_id));
                    if !balance.covers(*amount) {
                        return Ok(RechargeResult::Insufficient {
                            user_id: *user_id,
                            available: balance.balance,
                        });
                    }
                    balance.balance -= *amount;
                    balance.updated_at = Utc::now();
                    let mut transfer = transfer.clone();
                    transfer.company_id = company_id;
                    Some((balance, transfer))
                }
                _ => None,
            };

            let recorded = self.billing.record_payment(ctx, &recharge.payment).await?;

            customer.expiry_date = Some(recharge.new_expiry);
            customer.touch();
            let balance = match debited {
                Some((balance, transfer)) => {
                    balances.insert((balance.company_id, balance.user_id), balance.clone());
                    self.transfers.write().await.push(transfer);
                    Some(balance)
                }
                None => None,
            };

            Ok(RechargeResult::Applied {
                balance,
                payment: recorded.payment,
            })
        }

        async fn settle_commissions(
            &self,
            ctx: &TenantContext,
            settlement: &CommissionSettlement,
        ) -> Result<SettlementResult, PortError> {
            let company_id = ctx.stamp(settlement.company_id)?;
            let mut balances = self.balances.write().await;
            let mut commissions = self.commissions.write().await;

            let matching: Vec<CommissionId> = commissions
                .values()
                .filter(|c| {
                    c.company_id == company_id
                        && c.reseller_id == settlement.reseller_id
                        && c.status == settlement.from_status
                })
                .map(|c| c.id)
                .collect();
            let total: Decimal = matching
                .iter()
                .filter_map(|id| commissions.get(id))
                .map(|c| c.commission_amount)
                .sum();
            if matching.is_empty() || total.is_zero() {
                return Ok(SettlementResult::empty());
            }

            for id in &matching {
                if let Some(c) = commissions.get_mut(id) {
                    c.status = settlement.to_status;
                    c.paid_at = settlement.paid_at;
                }
            }

            let mut result = SettlementResult {
                count: matching.len(),
                total,
                balance: None,
                transfer: None,
            };
            if settlement.credit {
                let balance = balances
                    .entry((company_id, settlement.reseller_id))
                    .or_insert_with(|| ResellerBalance::open(company_id, settlement.reseller_id));
                balance.balance += total;
                balance.updated_at = Utc::now();
                result.balance = Some(balance.clone());

                let transfer = FundTransfer::commission_payout(company_id, settlement.reseller_id, total, matching.len());
                self.transfers.write().await.push(transfer.clone());
                result.transfer = Some(transfer);
            }
            Ok(result)
        }

        async fn resellers_with_commissions(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
            status: CommissionStatus,
        ) -> Result<Vec<UserId>, PortError> {
            let scope = ctx.read_scope()?;
            let mut resellers: Vec<UserId> = self
                .commissions
                .read()
                .await
                .values()
                .filter(|c| scope.allows(c.company_id) && c.company_id == company_id && c.status == status)
                .map(|c| c.reseller_id)
                .collect();
            resellers.sort_by_key(|id| *id.as_uuid());
            resellers.dedup();
            Ok(resellers)
        }

        async fn list_transfers(
            &self,
            ctx: &TenantContext,
            user_id: UserId,
            limit: u32,
        ) -> Result<Vec<FundTransfer>, PortError> {
            let scope = ctx.read_scope()?;
            let transfers = self.transfers.read().await;
            let mut result: Vec<_> = transfers
                .iter()
                .filter(|t| scope.allows(t.company_id) && t.involves(user_id))
                .cloned()
                .collect();
            result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.as_uuid().cmp(a.id.as_uuid())));
            result.truncate(limit as usize);
            Ok(result)
        }
    }
}
