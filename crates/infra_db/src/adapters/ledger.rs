//! Reseller ledger over `reseller_balances`, `fund_transfers` and commissions
//!
//! Balance rows touched by a movement are created if missing and then
//! locked with `SELECT ... FOR UPDATE` in user-id order, so two movements
//! over the same pair of users serialize instead of deadlocking.
//!
//! A recharge runs its debit through the same path and then writes the
//! customer's expiry and the payment in the same transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use core_kernel::{CompanyId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantContext, UserId};
use domain_billing::CommissionStatus;
use domain_reseller::{
    BalanceMovement, CommissionSettlement, FundTransfer, LedgerStore, MovementResult, RechargeRecord, RechargeResult,
    ResellerBalance, SettlementResult, TransferType,
};

use super::billing::{lock_owner, write_payment};
use super::{parse_column, ping};
use crate::error::port;
use crate::tenant::read_filter;

#[derive(Debug, sqlx::FromRow)]
struct BalanceRow {
    company_id: Uuid,
    user_id: Uuid,
    balance: Decimal,
    updated_at: DateTime<Utc>,
}

impl From<BalanceRow> for ResellerBalance {
    fn from(row: BalanceRow) -> Self {
        ResellerBalance {
            user_id: row.user_id.into(),
            company_id: row.company_id.into(),
            balance: row.balance,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: Uuid,
    company_id: Uuid,
    transfer_type: String,
    amount: Decimal,
    from_user_id: Option<Uuid>,
    to_user_id: Option<Uuid>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for FundTransfer {
    type Error = PortError;

    fn try_from(row: TransferRow) -> Result<Self, Self::Error> {
        Ok(FundTransfer {
            id: row.id.into(),
            company_id: row.company_id.into(),
            transfer_type: parse_column::<TransferType>("fund_transfers", &row.transfer_type)?,
            amount: row.amount,
            from_user_id: row.from_user_id.map(Into::into),
            to_user_id: row.to_user_id.map(Into::into),
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

async fn insert_transfer(tx: &mut Transaction<'_, Postgres>, transfer: &FundTransfer) -> Result<(), PortError> {
    sqlx::query(
        "INSERT INTO fund_transfers (id, company_id, transfer_type, amount, from_user_id, to_user_id, notes, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(Uuid::from(transfer.id))
    .bind(Uuid::from(transfer.company_id))
    .bind(transfer.transfer_type.as_str())
    .bind(transfer.amount)
    .bind(transfer.from_user_id.map(Uuid::from))
    .bind(transfer.to_user_id.map(Uuid::from))
    .bind(&transfer.notes)
    .bind(transfer.created_at)
    .execute(&mut **tx)
    .await
    .map_err(port)?;
    Ok(())
}

async fn set_balance(
    tx: &mut Transaction<'_, Postgres>,
    company_id: CompanyId,
    user_id: UserId,
    balance: Decimal,
    at: DateTime<Utc>,
) -> Result<ResellerBalance, PortError> {
    sqlx::query("UPDATE reseller_balances SET balance = $3, updated_at = $4 WHERE company_id = $1 AND user_id = $2")
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(user_id))
        .bind(balance)
        .bind(at)
        .execute(&mut **tx)
        .await
        .map_err(port)?;
    Ok(ResellerBalance {
        user_id,
        company_id,
        balance,
        updated_at: at,
    })
}

/// Applies a movement inside `tx` without committing
///
/// On `Insufficient` the caller must roll `tx` back.
async fn apply_movement_in(
    tx: &mut Transaction<'_, Postgres>,
    company_id: CompanyId,
    movement: &BalanceMovement,
) -> Result<MovementResult, PortError> {
    let mut users: Vec<Uuid> = movement.debit.iter().chain(movement.credit.iter()).map(|u| Uuid::from(*u)).collect();
    users.sort();
    users.dedup();

    for user in &users {
        sqlx::query(
            "INSERT INTO reseller_balances (company_id, user_id, balance, updated_at) VALUES ($1, $2, 0, NOW()) \
             ON CONFLICT (company_id, user_id) DO NOTHING",
        )
        .bind(Uuid::from(company_id))
        .bind(user)
        .execute(&mut **tx)
        .await
        .map_err(port)?;
    }

    let locked: HashMap<Uuid, Decimal> = sqlx::query_as::<_, (Uuid, Decimal)>(
        "SELECT user_id, balance FROM reseller_balances \
         WHERE company_id = $1 AND user_id = ANY($2) ORDER BY user_id FOR UPDATE",
    )
    .bind(Uuid::from(company_id))
    .bind(&users[..])
    .fetch_all(&mut **tx)
    .await
    .map_err(port)?
    .into_iter()
    .collect();
    let current = |user: UserId| locked.get(&Uuid::from(user)).copied().unwrap_or(Decimal::ZERO);

    let now = Utc::now();
    let debited = match movement.debit {
        Some(user_id) => {
            let available = current(user_id);
            if available < movement.amount {
                debug!(user_id = %user_id, available = %available, "movement rejected: insufficient balance");
                return Ok(MovementResult::Insufficient { user_id, available });
            }
            Some(set_balance(tx, company_id, user_id, available - movement.amount, now).await?)
        }
        None => None,
    };
    let credited = match movement.credit {
        Some(user_id) => {
            let base = match &debited {
                Some(d) if d.user_id == user_id => d.balance,
                _ => current(user_id),
            };
            Some(set_balance(tx, company_id, user_id, base + movement.amount, now).await?)
        }
        None => None,
    };

    let mut transfer = movement.transfer.clone();
    transfer.company_id = company_id;
    insert_transfer(tx, &transfer).await?;

    Ok(MovementResult::Applied { debited, credited })
}

/// PostgreSQL-backed `LedgerStore`
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-ledger-store").await
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn get_or_create_balance(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        user_id: UserId,
    ) -> Result<ResellerBalance, PortError> {
        let company_id = ctx.stamp(company_id)?;
        let row = sqlx::query_as::<_, BalanceRow>(
            "WITH created AS ( \
                 INSERT INTO reseller_balances (company_id, user_id, balance, updated_at) \
                 VALUES ($1, $2, 0, NOW()) \
                 ON CONFLICT (company_id, user_id) DO NOTHING \
                 RETURNING company_id, user_id, balance, updated_at) \
             SELECT company_id, user_id, balance, updated_at FROM created \
             UNION ALL \
             SELECT company_id, user_id, balance, updated_at FROM reseller_balances \
             WHERE company_id = $1 AND user_id = $2",
        )
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(user_id))
        .fetch_one(&self.pool)
        .await
        .map_err(port)?;
        Ok(row.into())
    }

    #[instrument(skip(self, ctx, movement), fields(transfer_type = movement.transfer.transfer_type.as_str(), amount = %movement.amount))]
    async fn apply_movement(&self, ctx: &TenantContext, movement: &BalanceMovement) -> Result<MovementResult, PortError> {
        let company_id = ctx.stamp(movement.company_id)?;
        let mut tx = self.pool.begin().await.map_err(port)?;
        let result = apply_movement_in(&mut tx, company_id, movement).await?;
        match result {
            MovementResult::Applied { .. } => tx.commit().await.map_err(port)?,
            MovementResult::Insufficient { .. } => tx.rollback().await.map_err(port)?,
        }
        Ok(result)
    }

    #[instrument(skip(self, ctx, recharge), fields(customer_id = %recharge.customer_id))]
    async fn apply_recharge(&self, ctx: &TenantContext, recharge: &RechargeRecord) -> Result<RechargeResult, PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;

        let balance = match &recharge.debit {
            Some(movement) => {
                let company_id = ctx.stamp(movement.company_id)?;
                match apply_movement_in(&mut tx, company_id, movement).await? {
                    MovementResult::Applied { debited, .. } => debited,
                    MovementResult::Insufficient { user_id, available } => {
                        tx.rollback().await.map_err(port)?;
                        return Ok(RechargeResult::Insufficient { user_id, available });
                    }
                }
            }
            None => None,
        };

        lock_owner(&mut tx, ctx, "customers", "Customer", recharge.customer_id.into()).await?;
        let extended = sqlx::query(
            "UPDATE customers SET expiry_date = $2, updated_at = $3 \
             WHERE id = $1 AND expiry_date IS NOT DISTINCT FROM $4",
        )
        .bind(Uuid::from(recharge.customer_id))
        .bind(recharge.new_expiry)
        .bind(Utc::now())
        .bind(recharge.previous_expiry)
        .execute(&mut *tx)
        .await
        .map_err(port)?
        .rows_affected();
        if extended == 0 {
            return Err(PortError::conflict(format!(
                "expiry of customer {} changed during recharge",
                recharge.customer_id
            )));
        }

        let recorded = write_payment(&mut tx, ctx, &recharge.payment).await?;
        tx.commit().await.map_err(port)?;

        info!(
            customer_id = %recharge.customer_id,
            payment_id = %recorded.payment.id,
            debited = balance.is_some(),
            "recharge committed"
        );
        Ok(RechargeResult::Applied {
            balance,
            payment: recorded.payment,
        })
    }

    #[instrument(skip(self, ctx, settlement), fields(reseller_id = %settlement.reseller_id))]
    async fn settle_commissions(
        &self,
        ctx: &TenantContext,
        settlement: &CommissionSettlement,
    ) -> Result<SettlementResult, PortError> {
        let company_id = ctx.stamp(settlement.company_id)?;
        let mut tx = self.pool.begin().await.map_err(port)?;

        let amounts: Vec<Decimal> = sqlx::query_scalar(
            "UPDATE reseller_commissions SET status = $4, paid_at = $5 \
             WHERE company_id = $1 AND reseller_id = $2 AND status = $3 \
             RETURNING commission_amount",
        )
        .bind(Uuid::from(company_id))
        .bind(Uuid::from(settlement.reseller_id))
        .bind(settlement.from_status.as_str())
        .bind(settlement.to_status.as_str())
        .bind(settlement.paid_at)
        .fetch_all(&mut *tx)
        .await
        .map_err(port)?;

        let total: Decimal = amounts.iter().copied().sum();
        if amounts.is_empty() || total.is_zero() {
            tx.rollback().await.map_err(port)?;
            return Ok(SettlementResult::empty());
        }

        let mut result = SettlementResult {
            count: amounts.len(),
            total,
            balance: None,
            transfer: None,
        };
        if settlement.credit {
            let row = sqlx::query_as::<_, BalanceRow>(
                "INSERT INTO reseller_balances (company_id, user_id, balance, updated_at) VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (company_id, user_id) \
                 DO UPDATE SET balance = reseller_balances.balance + EXCLUDED.balance, updated_at = EXCLUDED.updated_at \
                 RETURNING company_id, user_id, balance, updated_at",
            )
            .bind(Uuid::from(company_id))
            .bind(Uuid::from(settlement.reseller_id))
            .bind(total)
            .fetch_one(&mut *tx)
            .await
            .map_err(port)?;
            result.balance = Some(row.into());

            let transfer = FundTransfer::commission_payout(company_id, settlement.reseller_id, total, amounts.len());
            insert_transfer(&mut tx, &transfer).await?;
            result.transfer = Some(transfer);
        }

        tx.commit().await.map_err(port)?;
        info!(count = result.count, total = %result.total, "commissions settled");
        Ok(result)
    }

    async fn resellers_with_commissions(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        status: CommissionStatus,
    ) -> Result<Vec<UserId>, PortError> {
        let filter = read_filter(ctx)?;
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT reseller_id FROM reseller_commissions \
             WHERE company_id = $1 AND status = $2 AND ($3::uuid IS NULL OR company_id = $3) \
             ORDER BY reseller_id",
        )
        .bind(Uuid::from(company_id))
        .bind(status.as_str())
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(port)?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn list_transfers(&self, ctx: &TenantContext, user_id: UserId, limit: u32) -> Result<Vec<FundTransfer>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, TransferRow>(
            "SELECT id, company_id, transfer_type, amount, from_user_id, to_user_id, notes, created_at \
             FROM fund_transfers \
             WHERE ($1::uuid IS NULL OR company_id = $1) AND (from_user_id = $2 OR to_user_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3",
        )
        .bind(filter)
        .bind(Uuid::from(user_id))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(FundTransfer::try_from)
        .collect()
    }
}
