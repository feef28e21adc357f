//! Bulk customer mutations and import records
//!
//! Each chunk runs in its own transaction. The chunk's rows are locked first
//! and their owners checked; a chunk naming another tenant's customer is
//! rejected whole.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    BulkImportId, CompanyId, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, PackageId, PortError,
    TenantContext,
};
use domain_billing::CustomerStatus;
use domain_bulk::{BulkImport, BulkStore, ImportStatus};

use super::{parse_column, ping, to_u32};
use crate::error::{port, DatabaseError};
use crate::tenant::read_filter;

const IMPORT_COLUMNS: &str = "id, company_id, user_id, file_name, total_records, success_records, failed_records, \
    status, error_log, created_at, completed_at";

#[derive(Debug, sqlx::FromRow)]
struct ImportRow {
    id: Uuid,
    company_id: Uuid,
    user_id: Option<Uuid>,
    file_name: String,
    total_records: i32,
    success_records: i32,
    failed_records: i32,
    status: String,
    error_log: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ImportRow> for BulkImport {
    type Error = PortError;

    fn try_from(row: ImportRow) -> Result<Self, Self::Error> {
        Ok(BulkImport {
            id: row.id.into(),
            company_id: row.company_id.into(),
            user_id: row.user_id.map(Into::into),
            file_name: row.file_name,
            total_records: to_u32("bulk_imports", row.total_records)?,
            success_records: to_u32("bulk_imports", row.success_records)?,
            failed_records: to_u32("bulk_imports", row.failed_records)?,
            status: parse_column::<ImportStatus>("bulk_imports", &row.status)?,
            error_log: row.error_log,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

fn count(value: u32) -> Result<i32, PortError> {
    i32::try_from(value).map_err(|_| PortError::validation("record count out of range"))
}

#[derive(Debug, Clone)]
pub struct PostgresBulkStore {
    pool: PgPool,
}

impl PostgresBulkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the chunk transaction with its rows locked and ownership checked
    async fn begin_chunk(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
    ) -> Result<(Transaction<'static, Postgres>, Vec<Uuid>), PortError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| Uuid::from(*id)).collect();
        let mut tx = self.pool.begin().await.map_err(port)?;
        let owners: Vec<Uuid> = sqlx::query_scalar(
            "SELECT company_id FROM customers WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids[..])
        .fetch_all(&mut *tx)
        .await
        .map_err(port)?;
        for owner in owners {
            ctx.authorize_write(CompanyId::from(owner))?;
        }
        Ok((tx, ids))
    }

    async fn finish(tx: Transaction<'static, Postgres>, affected: u64) -> Result<u64, PortError> {
        tx.commit().await.map_err(port)?;
        debug!(affected, "bulk chunk committed");
        Ok(affected)
    }
}

impl DomainPort for PostgresBulkStore {}

#[async_trait]
impl HealthCheckable for PostgresBulkStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-bulk-store").await
    }
}

#[async_trait]
impl BulkStore for PostgresBulkStore {
    #[instrument(skip(self, ctx, ids), fields(chunk = ids.len()))]
    async fn extend_expiry(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
        days: u32,
        today: NaiveDate,
    ) -> Result<u64, PortError> {
        let (mut tx, ids) = self.begin_chunk(ctx, ids).await?;
        let days = i32::try_from(days).map_err(|_| PortError::validation_field("too many days", "days"))?;
        let result = sqlx::query(
            "UPDATE customers SET expiry_date = COALESCE(expiry_date, $2) + $3, updated_at = NOW() \
             WHERE id = ANY($1)",
        )
        .bind(&ids[..])
        .bind(today)
        .bind(days)
        .execute(&mut *tx)
        .await
        .map_err(port)?;
        Self::finish(tx, result.rows_affected()).await
    }

    #[instrument(skip(self, ctx, ids), fields(chunk = ids.len()))]
    async fn change_package(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
        package_id: PackageId,
    ) -> Result<u64, PortError> {
        let (mut tx, ids) = self.begin_chunk(ctx, ids).await?;
        let result = sqlx::query("UPDATE customers SET package_id = $2, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&ids[..])
            .bind(Uuid::from(package_id))
            .execute(&mut *tx)
            .await
            .map_err(port)?;
        Self::finish(tx, result.rows_affected()).await
    }

    #[instrument(skip(self, ctx, ids), fields(chunk = ids.len(), status = status.as_str()))]
    async fn set_status(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
        status: CustomerStatus,
    ) -> Result<u64, PortError> {
        let (mut tx, ids) = self.begin_chunk(ctx, ids).await?;
        let result = sqlx::query("UPDATE customers SET status = $2, updated_at = NOW() WHERE id = ANY($1)")
            .bind(&ids[..])
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(port)?;
        Self::finish(tx, result.rows_affected()).await
    }

    async fn insert_import(&self, ctx: &TenantContext, import: &BulkImport) -> Result<BulkImport, PortError> {
        let mut stored = import.clone();
        stored.company_id = ctx.stamp(import.company_id)?;
        sqlx::query(&format!(
            "INSERT INTO bulk_imports ({IMPORT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(Uuid::from(stored.id))
        .bind(Uuid::from(stored.company_id))
        .bind(stored.user_id.map(Uuid::from))
        .bind(&stored.file_name)
        .bind(count(stored.total_records)?)
        .bind(count(stored.success_records)?)
        .bind(count(stored.failed_records)?)
        .bind(stored.status.as_str())
        .bind(&stored.error_log)
        .bind(stored.created_at)
        .bind(stored.completed_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(stored)
    }

    async fn update_import(&self, ctx: &TenantContext, import: &BulkImport) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;
        super::billing::lock_owner(&mut tx, ctx, "bulk_imports", "BulkImport", import.id.into()).await?;
        sqlx::query(
            "UPDATE bulk_imports SET total_records = $2, success_records = $3, failed_records = $4, status = $5, \
             error_log = $6, completed_at = $7 WHERE id = $1",
        )
        .bind(Uuid::from(import.id))
        .bind(count(import.total_records)?)
        .bind(count(import.success_records)?)
        .bind(count(import.failed_records)?)
        .bind(import.status.as_str())
        .bind(&import.error_log)
        .bind(import.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(port)?;
        tx.commit().await.map_err(port)
    }

    async fn get_import(&self, ctx: &TenantContext, id: BulkImportId) -> Result<BulkImport, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, ImportRow>(&format!(
            "SELECT {IMPORT_COLUMNS} FROM bulk_imports WHERE id = $1 AND ($2::uuid IS NULL OR company_id = $2)"
        ))
        .bind(Uuid::from(id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?
        .ok_or_else(|| DatabaseError::not_found("BulkImport", id))?;
        row.try_into()
    }

    async fn list_imports(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<BulkImport>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, ImportRow>(&format!(
            "SELECT {IMPORT_COLUMNS} FROM bulk_imports \
             WHERE ($1::uuid IS NULL OR company_id = $1) \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(filter)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(BulkImport::try_from)
        .collect()
    }
}
