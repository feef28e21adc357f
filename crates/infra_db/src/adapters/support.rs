//! Support tickets and their activity log
//!
//! A ticket write and its log row share one transaction. Updates lock the
//! ticket row and compare its status with the one the caller read.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, TenantContext, TicketId};
use domain_support::{Ticket, TicketChange, TicketFilter, TicketLog, TicketStatus, TicketStore};

use super::billing::lock_owner;
use super::{parse_column, ping};
use crate::error::{port, DatabaseError};
use crate::tenant::read_filter;

const TICKET_COLUMNS: &str = "id, company_id, customer_id, assigned_to, category, subject, description, \
                              priority, status, created_at, updated_at";

const LOG_COLUMNS: &str = "id, ticket_id, company_id, user_id, action, description, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    company_id: Uuid,
    customer_id: Option<Uuid>,
    assigned_to: Option<Uuid>,
    category: String,
    subject: String,
    description: String,
    priority: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = PortError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id.into(),
            company_id: row.company_id.into(),
            customer_id: row.customer_id.map(Into::into),
            assigned_to: row.assigned_to.map(Into::into),
            category: row.category,
            subject: row.subject,
            description: row.description,
            priority: parse_column("support_tickets", &row.priority)?,
            status: parse_column("support_tickets", &row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TicketLogRow {
    id: Uuid,
    ticket_id: Uuid,
    company_id: Uuid,
    user_id: Uuid,
    action: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TicketLogRow> for TicketLog {
    type Error = PortError;

    fn try_from(row: TicketLogRow) -> Result<Self, Self::Error> {
        Ok(TicketLog {
            id: row.id.into(),
            ticket_id: row.ticket_id.into(),
            company_id: row.company_id.into(),
            user_id: row.user_id.into(),
            action: parse_column("ticket_logs", &row.action)?,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// Writes `log` against the ticket owned by `owner`
async fn insert_log_in(
    tx: &mut Transaction<'_, Postgres>,
    owner: Uuid,
    log: &TicketLog,
) -> Result<(), PortError> {
    sqlx::query(&format!("INSERT INTO ticket_logs ({LOG_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"))
        .bind(Uuid::from(log.id))
        .bind(Uuid::from(log.ticket_id))
        .bind(owner)
        .bind(Uuid::from(log.user_id))
        .bind(log.action.as_str())
        .bind(&log.description)
        .bind(log.created_at)
        .execute(&mut **tx)
        .await
        .map_err(port)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresTicketStore {}

#[async_trait]
impl HealthCheckable for PostgresTicketStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-ticket-store").await
    }
}

#[async_trait]
impl TicketStore for PostgresTicketStore {
    async fn insert_ticket(&self, ctx: &TenantContext, ticket: &Ticket, log: &TicketLog) -> Result<(), PortError> {
        let company_id = Uuid::from(ctx.stamp(ticket.company_id)?);
        let mut tx = self.pool.begin().await.map_err(port)?;

        sqlx::query(&format!(
            "INSERT INTO support_tickets ({TICKET_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(Uuid::from(ticket.id))
        .bind(company_id)
        .bind(ticket.customer_id.map(Uuid::from))
        .bind(ticket.assigned_to.map(Uuid::from))
        .bind(&ticket.category)
        .bind(&ticket.subject)
        .bind(&ticket.description)
        .bind(ticket.priority.as_str())
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(port)?;

        insert_log_in(&mut tx, company_id, log).await?;
        tx.commit().await.map_err(port)
    }

    async fn get_ticket(&self, ctx: &TenantContext, id: TicketId) -> Result<Ticket, PortError> {
        let filter = read_filter(ctx)?;
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets \
             WHERE id = $1 AND ($2::uuid IS NULL OR company_id = $2)"
        ))
        .bind(Uuid::from(id))
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(port)?
        .ok_or_else(|| DatabaseError::not_found("Ticket", id))?;
        row.try_into()
    }

    async fn list_tickets(&self, ctx: &TenantContext, filter: &TicketFilter) -> Result<Vec<Ticket>, PortError> {
        let company = read_filter(ctx)?;
        sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets \
             WHERE ($1::uuid IS NULL OR company_id = $1) \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::uuid IS NULL OR customer_id = $3) \
               AND ($4::uuid IS NULL OR assigned_to = $4) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(company)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.customer_id.map(Uuid::from))
        .bind(filter.assigned_to.map(Uuid::from))
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(Ticket::try_from)
        .collect()
    }

    async fn update_ticket(&self, ctx: &TenantContext, change: &TicketChange) -> Result<(), PortError> {
        let ticket = &change.ticket;
        let mut tx = self.pool.begin().await.map_err(port)?;
        let owner = Uuid::from(lock_owner(&mut tx, ctx, "support_tickets", "Ticket", ticket.id.into()).await?);

        let stored: String = sqlx::query_scalar("SELECT status FROM support_tickets WHERE id = $1")
            .bind(Uuid::from(ticket.id))
            .fetch_one(&mut *tx)
            .await
            .map_err(port)?;
        let stored = parse_column::<TicketStatus>("support_tickets", &stored)?;
        if stored != change.expected_status {
            return Err(PortError::conflict(format!(
                "ticket {} is {}, not {}",
                ticket.id, stored, change.expected_status
            )));
        }

        sqlx::query(
            "UPDATE support_tickets SET assigned_to = $2, status = $3, priority = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(Uuid::from(ticket.id))
        .bind(ticket.assigned_to.map(Uuid::from))
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(ticket.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(port)?;

        insert_log_in(&mut tx, owner, &change.log).await?;
        tx.commit().await.map_err(port)?;

        tracing::debug!(ticket_id = %ticket.id, status = ticket.status.as_str(), "ticket updated");
        Ok(())
    }

    async fn insert_log(&self, ctx: &TenantContext, log: &TicketLog) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(port)?;
        let owner = lock_owner(&mut tx, ctx, "support_tickets", "Ticket", log.ticket_id.into()).await?;
        insert_log_in(&mut tx, owner.into(), log).await?;
        tx.commit().await.map_err(port)
    }

    async fn list_logs(&self, ctx: &TenantContext, ticket_id: TicketId) -> Result<Vec<TicketLog>, PortError> {
        let filter = read_filter(ctx)?;
        sqlx::query_as::<_, TicketLogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM ticket_logs \
             WHERE ticket_id = $1 AND ($2::uuid IS NULL OR company_id = $2) \
             ORDER BY created_at, id"
        ))
        .bind(Uuid::from(ticket_id))
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(port)?
        .into_iter()
        .map(TicketLog::try_from)
        .collect()
    }
}
