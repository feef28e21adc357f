//! SMS templates and delivery logs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use core_kernel::{CompanyId, DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantContext};
use domain_integrations::{SmsCategory, SmsLog, SmsStatus, SmsStore, SmsTemplate};

use super::{parse_column, ping, to_u32};
use crate::error::{port, DatabaseError};
use crate::tenant::read_filter;

#[derive(Debug, sqlx::FromRow)]
struct SmsLogRow {
    id: Uuid,
    company_id: Uuid,
    phone_number: String,
    message: String,
    status: String,
    response: Option<String>,
    attempts: i32,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SmsLogRow> for SmsLog {
    type Error = PortError;

    fn try_from(row: SmsLogRow) -> Result<Self, Self::Error> {
        Ok(SmsLog {
            id: row.id.into(),
            company_id: row.company_id.into(),
            phone_number: row.phone_number,
            message: row.message,
            status: parse_column::<SmsStatus>("sms_logs", &row.status)?,
            response: row.response,
            attempts: to_u32("sms_logs", row.attempts)?,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

fn attempts(log: &SmsLog) -> Result<i32, PortError> {
    i32::try_from(log.attempts).map_err(|_| PortError::validation_field("too many attempts", "attempts"))
}

#[derive(Debug, Clone)]
pub struct PostgresSmsStore {
    pool: PgPool,
}

impl PostgresSmsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresSmsStore {}

#[async_trait]
impl HealthCheckable for PostgresSmsStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-sms-store").await
    }
}

#[async_trait]
impl SmsStore for PostgresSmsStore {
    async fn find_template(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        category: &SmsCategory,
    ) -> Result<Option<SmsTemplate>, PortError> {
        let filter = read_filter(ctx)?;
        let body: Option<String> = sqlx::query_scalar(
            "SELECT body FROM sms_templates \
             WHERE company_id = $1 AND category = $2 AND ($3::uuid IS NULL OR company_id = $3)",
        )
        .bind(Uuid::from(company_id))
        .bind(category.as_str())
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?;

        Ok(body.map(|body| SmsTemplate {
            company_id,
            category: category.clone(),
            body,
        }))
    }

    async fn save_template(&self, ctx: &TenantContext, template: &SmsTemplate) -> Result<(), PortError> {
        let company_id = ctx.stamp(template.company_id)?;
        sqlx::query(
            "INSERT INTO sms_templates (company_id, category, body) VALUES ($1, $2, $3) \
             ON CONFLICT (company_id, category) DO UPDATE SET body = EXCLUDED.body",
        )
        .bind(Uuid::from(company_id))
        .bind(template.category.as_str())
        .bind(&template.body)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(())
    }

    async fn insert_log(&self, ctx: &TenantContext, log: &SmsLog) -> Result<(), PortError> {
        let company_id = ctx.stamp(log.company_id)?;
        sqlx::query(
            "INSERT INTO sms_logs (id, company_id, phone_number, message, status, response, attempts, sent_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::from(log.id))
        .bind(Uuid::from(company_id))
        .bind(&log.phone_number)
        .bind(&log.message)
        .bind(log.status.as_str())
        .bind(&log.response)
        .bind(attempts(log)?)
        .bind(log.sent_at)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(port)?;
        Ok(())
    }

    async fn update_log(&self, ctx: &TenantContext, log: &SmsLog) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;
        super::billing::lock_owner(&mut tx, ctx, "sms_logs", "SmsLog", log.id.into()).await?;

        let result = sqlx::query(
            "UPDATE sms_logs SET status = $2, response = $3, attempts = $4, sent_at = $5 WHERE id = $1",
        )
        .bind(Uuid::from(log.id))
        .bind(log.status.as_str())
        .bind(&log.response)
        .bind(attempts(log)?)
        .bind(log.sent_at)
        .execute(&mut *tx)
        .await
        .map_err(port)?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("SmsLog", log.id).into());
        }
        tx.commit().await.map_err(port)
    }

    async fn failed_logs(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<SmsLog>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, SmsLogRow>(
            "SELECT id, company_id, phone_number, message, status, response, attempts, sent_at, created_at \
             FROM sms_logs \
             WHERE status = 'failed' AND ($1::uuid IS NULL OR company_id = $1) \
             ORDER BY created_at \
             LIMIT $2",
        )
        .bind(filter)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(SmsLog::try_from)
        .collect()
    }
}
