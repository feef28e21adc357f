//! Reseller ledger service
//!
//! Balance reads, funding, deductions, reseller-to-employee transfers and
//! commission payouts. Each mutation is handed to the store as one atomic
//! movement and writes exactly one `FundTransfer`.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use core_kernel::{ensure_positive, Clock, CompanyId, TenantContext, UserId};
use domain_billing::{CommissionStatus, Payment};

use crate::balance::ResellerBalance;
use crate::error::LedgerError;
use crate::ports::{
    BalanceMovement, CommissionSettlement, LedgerStore, MovementResult, RechargeRecord, RechargeResult, SettlementResult,
};
use crate::principal::Principal;
use crate::transfer::{FundTransfer, TransferType};

/// Default page size for `transfer_history`
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// What a payout did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutSummary {
    pub reseller_id: UserId,
    pub commissions: usize,
    pub total: Decimal,
    /// `paid` for immediate payouts and settlements, `ready_for_payout` when deferred
    pub status: Option<CommissionStatus>,
    pub balance: Option<Decimal>,
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the user's balance, opening it at 0.00 on first access
    pub async fn get_reseller_balance(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<ResellerBalance, LedgerError> {
        Ok(self.store.get_or_create_balance(ctx, company_id, user_id).await?)
    }

    async fn apply(
        &self,
        ctx: &TenantContext,
        movement: BalanceMovement,
    ) -> Result<(Option<ResellerBalance>, Option<ResellerBalance>), LedgerError> {
        match self.store.apply_movement(ctx, &movement).await? {
            MovementResult::Applied { debited, credited } => {
                debug!(
                    company_id = %movement.company_id,
                    transfer_type = movement.transfer.transfer_type.as_str(),
                    amount = %movement.amount,
                    "balance movement applied"
                );
                Ok((debited, credited))
            }
            MovementResult::Insufficient { user_id, available } => {
                info!(
                    user_id = %user_id,
                    available = %available,
                    requested = %movement.amount,
                    "insufficient balance"
                );
                Err(LedgerError::InsufficientBalance {
                    user_id,
                    available,
                    requested: movement.amount,
                })
            }
        }
    }

    /// Credits a balance
    #[allow(clippy::too_many_arguments)]
    pub async fn add_balance(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        user_id: UserId,
        amount: Decimal,
        transfer_type: TransferType,
        from_user_id: Option<UserId>,
        notes: Option<String>,
    ) -> Result<ResellerBalance, LedgerError> {
        let amount = ensure_positive(amount)?;
        let company_id = ctx.stamp(company_id)?;
        let transfer = FundTransfer::new(company_id, transfer_type, amount, from_user_id, Some(user_id), notes);
        let (_, credited) = self
            .apply(
                ctx,
                BalanceMovement {
                    company_id,
                    debit: None,
                    credit: Some(user_id),
                    amount,
                    transfer,
                },
            )
            .await?;
        credited.ok_or_else(|| LedgerError::Calculation("credit not applied".to_string()))
    }

    /// Debits a balance; fails with `InsufficientBalance` and changes nothing
    /// if the balance does not cover `amount`
    pub async fn deduct_balance(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        user_id: UserId,
        amount: Decimal,
        transfer_type: TransferType,
        notes: Option<String>,
    ) -> Result<ResellerBalance, LedgerError> {
        let amount = ensure_positive(amount)?;
        let company_id = ctx.stamp(company_id)?;
        let transfer = FundTransfer::new(company_id, transfer_type, amount, Some(user_id), None, notes);
        let (debited, _) = self
            .apply(
                ctx,
                BalanceMovement {
                    company_id,
                    debit: Some(user_id),
                    credit: None,
                    amount,
                    transfer,
                },
            )
            .await?;
        debited.ok_or_else(|| LedgerError::Calculation("debit not applied".to_string()))
    }

    /// Admin funding of a reseller
    pub async fn add_reseller_balance(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        reseller_id: UserId,
        amount: Decimal,
        admin_id: UserId,
        note: Option<String>,
    ) -> Result<ResellerBalance, LedgerError> {
        let balance = self
            .add_balance(
                ctx,
                company_id,
                reseller_id,
                amount,
                TransferType::FromAdminToReseller,
                Some(admin_id),
                note,
            )
            .await?;
        info!(reseller_id = %reseller_id, amount = %amount, balance = %balance.balance, "reseller funded");
        Ok(balance)
    }

    /// Moves funds from a reseller to one of their employees
    ///
    /// # Returns
    ///
    /// The reseller's and the employee's balances after the transfer
    pub async fn transfer_to_employee(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        reseller_id: UserId,
        employee_id: UserId,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<(ResellerBalance, ResellerBalance), LedgerError> {
        if reseller_id == employee_id {
            return Err(LedgerError::InvalidTransfer(
                "reseller and employee must differ".to_string(),
            ));
        }
        let amount = ensure_positive(amount)?;
        let company_id = ctx.stamp(company_id)?;
        let transfer = FundTransfer::new(
            company_id,
            TransferType::ResellerToEmployee,
            amount,
            Some(reseller_id),
            Some(employee_id),
            notes,
        );
        let (debited, credited) = self
            .apply(
                ctx,
                BalanceMovement {
                    company_id,
                    debit: Some(reseller_id),
                    credit: Some(employee_id),
                    amount,
                    transfer,
                },
            )
            .await?;

        match (debited, credited) {
            (Some(reseller), Some(employee)) => {
                info!(
                    reseller_id = %reseller_id,
                    employee_id = %employee_id,
                    amount = %amount,
                    "funds transferred to employee"
                );
                Ok((reseller, employee))
            }
            _ => Err(LedgerError::Calculation("transfer not applied".to_string())),
        }
    }

    /// Pays out a reseller's pending commissions
    ///
    /// Immediate: the sum is credited, commissions become `paid` and one
    /// payout transfer is written. Deferred: commissions only move to
    /// `ready_for_payout`; no balance moves and no transfer is written.
    /// Nothing pending is a no-op.
    pub async fn payout_commission(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        reseller_id: UserId,
        immediate: bool,
    ) -> Result<PayoutSummary, LedgerError> {
        let settlement = CommissionSettlement {
            company_id: ctx.stamp(company_id)?,
            reseller_id,
            from_status: CommissionStatus::Pending,
            to_status: if immediate {
                CommissionStatus::Paid
            } else {
                CommissionStatus::ReadyForPayout
            },
            paid_at: immediate.then(|| self.clock.now()),
            credit: immediate,
        };
        self.settle(ctx, settlement).await
    }

    /// Credits and marks `paid` every `ready_for_payout` commission of a reseller
    pub async fn settle_ready_commissions(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        reseller_id: UserId,
    ) -> Result<PayoutSummary, LedgerError> {
        let settlement = CommissionSettlement {
            company_id: ctx.stamp(company_id)?,
            reseller_id,
            from_status: CommissionStatus::ReadyForPayout,
            to_status: CommissionStatus::Paid,
            paid_at: Some(self.clock.now()),
            credit: true,
        };
        self.settle(ctx, settlement).await
    }

    async fn settle(
        &self,
        ctx: &TenantContext,
        settlement: CommissionSettlement,
    ) -> Result<PayoutSummary, LedgerError> {
        let SettlementResult {
            count,
            total,
            balance,
            ..
        } = self.store.settle_commissions(ctx, &settlement).await?;

        if count == 0 {
            debug!(reseller_id = %settlement.reseller_id, "no commissions to settle");
        } else {
            info!(
                reseller_id = %settlement.reseller_id,
                commissions = count,
                total = %total,
                status = settlement.to_status.as_str(),
                "commissions settled"
            );
        }

        Ok(PayoutSummary {
            reseller_id: settlement.reseller_id,
            commissions: count,
            total,
            status: (count > 0).then_some(settlement.to_status),
            balance: balance.map(|b| b.balance),
        })
    }

    /// Runs `payout_commission` for every reseller of a company with pending commissions
    pub async fn payout_all(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        immediate: bool,
    ) -> Result<Vec<PayoutSummary>, LedgerError> {
        let resellers = self
            .store
            .resellers_with_commissions(ctx, company_id, CommissionStatus::Pending)
            .await?;
        let mut summaries = Vec::with_capacity(resellers.len());
        for reseller_id in resellers {
            summaries.push(self.payout_commission(ctx, company_id, reseller_id, immediate).await?);
        }
        Ok(summaries)
    }

    /// Runs `settle_ready_commissions` for every reseller of a company
    pub async fn settle_all(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<Vec<PayoutSummary>, LedgerError> {
        let resellers = self
            .store
            .resellers_with_commissions(ctx, company_id, CommissionStatus::ReadyForPayout)
            .await?;
        let mut summaries = Vec::with_capacity(resellers.len());
        for reseller_id in resellers {
            summaries.push(self.settle_ready_commissions(ctx, company_id, reseller_id).await?);
        }
        Ok(summaries)
    }

    /// True if the principal can fund a recharge of `amount`
    ///
    /// Principals without a balance (admins, operators) always can.
    pub async fn validate_balance_for_recharge(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        principal: &Principal,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        if !principal.holds_balance() {
            return Ok(true);
        }
        let balance = self.get_reseller_balance(ctx, company_id, principal.user_id).await?;
        Ok(balance.covers(amount))
    }

    /// The debit a recharge of `amount` makes from the principal's balance
    ///
    /// `None` for principals without a balance.
    pub fn recharge_debit(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        principal: &Principal,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<Option<BalanceMovement>, LedgerError> {
        let Some(transfer_type) = principal.recharge_transfer_type() else {
            return Ok(None);
        };
        let amount = ensure_positive(amount)?;
        let company_id = ctx.stamp(company_id)?;
        let transfer = FundTransfer::new(company_id, transfer_type, amount, Some(principal.user_id), None, notes);
        Ok(Some(BalanceMovement {
            company_id,
            debit: Some(principal.user_id),
            credit: None,
            amount,
            transfer,
        }))
    }

    /// Debits a recharge from the principal's balance
    ///
    /// Returns `None` without writing anything for principals without a
    /// balance.
    pub async fn deduct_balance_for_recharge(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        principal: &Principal,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<Option<ResellerBalance>, LedgerError> {
        let Some(movement) = self.recharge_debit(ctx, company_id, principal, amount, notes)? else {
            return Ok(None);
        };
        let (debited, _) = self.apply(ctx, movement).await?;
        debited
            .map(Some)
            .ok_or_else(|| LedgerError::Calculation("debit not applied".to_string()))
    }

    /// Applies a whole recharge in one store transaction
    ///
    /// Returns the debited balance (if any) and the stored payment.
    pub async fn apply_recharge(
        &self,
        ctx: &TenantContext,
        record: RechargeRecord,
    ) -> Result<(Option<ResellerBalance>, Payment), LedgerError> {
        match self.store.apply_recharge(ctx, &record).await? {
            RechargeResult::Applied { balance, payment } => Ok((balance, payment)),
            RechargeResult::Insufficient { user_id, available } => {
                let requested = record.payment.payment.amount;
                info!(user_id = %user_id, available = %available, requested = %requested, "insufficient balance");
                Err(LedgerError::InsufficientBalance {
                    user_id,
                    available,
                    requested,
                })
            }
        }
    }

    /// Transfers from or to a user, newest first
    pub async fn transfer_history(
        &self,
        ctx: &TenantContext,
        user_id: UserId,
        limit: Option<u32>,
    ) -> Result<Vec<FundTransfer>, LedgerError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(self.store.list_transfers(ctx, user_id, limit).await?)
    }
}
