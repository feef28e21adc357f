//! Append-only gateway audit trail

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantContext};
use domain_integrations::{GatewayAuditStore, GatewayTransactionLog, GatewayTransactionType};

use super::{parse_column, ping};
use crate::error::port;
use crate::tenant::read_filter;

#[derive(Debug, sqlx::FromRow)]
struct GatewayRow {
    id: Uuid,
    company_id: Uuid,
    gateway: String,
    transaction_type: String,
    customer_ref: Option<String>,
    trx_id: Option<String>,
    amount: Option<Decimal>,
    request: Json<Value>,
    response: Json<Value>,
    success: bool,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<GatewayRow> for GatewayTransactionLog {
    type Error = PortError;

    fn try_from(row: GatewayRow) -> Result<Self, Self::Error> {
        Ok(GatewayTransactionLog {
            id: row.id.into(),
            company_id: row.company_id.into(),
            gateway: row.gateway,
            transaction_type: parse_column::<GatewayTransactionType>("gateway_transactions", &row.transaction_type)?,
            customer_ref: row.customer_ref,
            trx_id: row.trx_id,
            amount: row.amount,
            request: row.request.0,
            response: row.response.0,
            success: row.success,
            error: row.error,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PostgresGatewayAuditStore {
    pool: PgPool,
}

impl PostgresGatewayAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresGatewayAuditStore {}

#[async_trait]
impl HealthCheckable for PostgresGatewayAuditStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-gateway-audit").await
    }
}

#[async_trait]
impl GatewayAuditStore for PostgresGatewayAuditStore {
    async fn record(&self, ctx: &TenantContext, log: &GatewayTransactionLog) -> Result<(), PortError> {
        let company_id = ctx.stamp(log.company_id)?;
        sqlx::query(
            "INSERT INTO gateway_transactions (id, company_id, gateway, transaction_type, customer_ref, trx_id, \
             amount, request, response, success, error, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(Uuid::from(log.id))
        .bind(Uuid::from(company_id))
        .bind(&log.gateway)
        .bind(log.transaction_type.as_str())
        .bind(&log.customer_ref)
        .bind(&log.trx_id)
        .bind(log.amount)
        .bind(Json(&log.request))
        .bind(Json(&log.response))
        .bind(log.success)
        .bind(&log.error)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(())
    }

    async fn list(
        &self,
        ctx: &TenantContext,
        gateway: Option<&str>,
        limit: u32,
    ) -> Result<Vec<GatewayTransactionLog>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, GatewayRow>(
            "SELECT id, company_id, gateway, transaction_type, customer_ref, trx_id, amount, request, response, \
             success, error, created_at \
             FROM gateway_transactions \
             WHERE ($1::uuid IS NULL OR company_id = $1) AND ($2::text IS NULL OR gateway = $2) \
             ORDER BY created_at DESC \
             LIMIT $3",
        )
        .bind(filter)
        .bind(gateway)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(GatewayTransactionLog::try_from)
        .collect()
    }
}
