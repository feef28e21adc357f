//! Support desk storage port
//!
//! Every write carries its `TicketLog` row so the change and its log entry
//! land together or not at all.

use async_trait::async_trait;
use serde::Deserialize;

use core_kernel::{CustomerId, DomainPort, HealthCheckable, PortError, TenantContext, TicketId, UserId};

use crate::ticket::{Ticket, TicketLog, TicketStatus};

/// Narrows a ticket listing; empty fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub customer_id: Option<CustomerId>,
    pub assigned_to: Option<UserId>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.status.map_or(true, |s| ticket.status == s)
            && self.customer_id.map_or(true, |c| ticket.customer_id == Some(c))
            && self.assigned_to.map_or(true, |u| ticket.assigned_to == Some(u))
    }
}

/// An updated ticket and the log row describing the update
///
/// `expected_status` is the status the ticket had when it was read; the
/// store refuses the write with `Conflict` if the stored row has moved on.
#[derive(Debug, Clone)]
pub struct TicketChange {
    pub ticket: Ticket,
    pub expected_status: TicketStatus,
    pub log: TicketLog,
}

#[async_trait]
pub trait TicketStore: DomainPort + HealthCheckable {
    /// Inserts a ticket with its `created` log row
    async fn insert_ticket(&self, ctx: &TenantContext, ticket: &Ticket, log: &TicketLog) -> Result<(), PortError>;

    async fn get_ticket(&self, ctx: &TenantContext, id: TicketId) -> Result<Ticket, PortError>;

    /// Tickets visible in `ctx`, newest first
    async fn list_tickets(&self, ctx: &TenantContext, filter: &TicketFilter) -> Result<Vec<Ticket>, PortError>;

    async fn update_ticket(&self, ctx: &TenantContext, change: &TicketChange) -> Result<(), PortError>;

    /// Appends a log row to an existing ticket
    async fn insert_log(&self, ctx: &TenantContext, log: &TicketLog) -> Result<(), PortError>;

    /// A ticket's log, oldest first
    async fn list_logs(&self, ctx: &TenantContext, ticket_id: TicketId) -> Result<Vec<TicketLog>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult};

    /// In-memory mock implementation of TicketStore
    ///
    /// Writes take the tickets guard before the logs guard.
    #[derive(Debug, Default, Clone)]
    pub struct MockTicketStore {
        pub tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
        pub logs: Arc<RwLock<Vec<TicketLog>>>,
    }

    impl MockTicketStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for MockTicketStore {}

    #[async_trait]
    impl HealthCheckable for MockTicketStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-ticket-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl TicketStore for MockTicketStore {
        async fn insert_ticket(&self, ctx: &TenantContext, ticket: &Ticket, log: &TicketLog) -> Result<(), PortError> {
            let company_id = ctx.stamp(ticket.company_id)?;
            let mut tickets = self.tickets.write().await;
            if tickets.contains_key(&ticket.id) {
                return Err(PortError::conflict(format!("ticket {} exists", ticket.id)));
            }
            let mut ticket = ticket.clone();
            ticket.company_id = company_id;
            let mut log = log.clone();
            log.company_id = company_id;

            tickets.insert(ticket.id, ticket);
            self.logs.write().await.push(log);
            Ok(())
        }

        async fn get_ticket(&self, ctx: &TenantContext, id: TicketId) -> Result<Ticket, PortError> {
            let scope = ctx.read_scope()?;
            self.tickets
                .read()
                .await
                .get(&id)
                .filter(|t| scope.allows(t.company_id))
                .cloned()
                .ok_or_else(|| PortError::not_found("Ticket", id))
        }

        async fn list_tickets(&self, ctx: &TenantContext, filter: &TicketFilter) -> Result<Vec<Ticket>, PortError> {
            let scope = ctx.read_scope()?;
            let mut result: Vec<_> = self
                .tickets
                .read()
                .await
                .values()
                .filter(|t| scope.allows(t.company_id) && filter.matches(t))
                .cloned()
                .collect();
            result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(result)
        }

        async fn update_ticket(&self, ctx: &TenantContext, change: &TicketChange) -> Result<(), PortError> {
            let mut tickets = self.tickets.write().await;
            let stored = tickets
                .get_mut(&change.ticket.id)
                .ok_or_else(|| PortError::not_found("Ticket", change.ticket.id))?;
            ctx.authorize_write(stored.company_id)?;
            if stored.status != change.expected_status {
                return Err(PortError::conflict(format!(
                    "ticket {} is {}, not {}",
                    stored.id, stored.status, change.expected_status
                )));
            }

            let company_id = stored.company_id;
            *stored = Ticket {
                company_id,
                ..change.ticket.clone()
            };
            self.logs.write().await.push(TicketLog {
                company_id,
                ..change.log.clone()
            });
            Ok(())
        }

        async fn insert_log(&self, ctx: &TenantContext, log: &TicketLog) -> Result<(), PortError> {
            let tickets = self.tickets.read().await;
            let owner = tickets
                .get(&log.ticket_id)
                .map(|t| t.company_id)
                .ok_or_else(|| PortError::not_found("Ticket", log.ticket_id))?;
            ctx.authorize_write(owner)?;
            self.logs.write().await.push(TicketLog {
                company_id: owner,
                ..log.clone()
            });
            Ok(())
        }

        async fn list_logs(&self, ctx: &TenantContext, ticket_id: TicketId) -> Result<Vec<TicketLog>, PortError> {
            let scope = ctx.read_scope()?;
            let mut logs: Vec<_> = self
                .logs
                .read()
                .await
                .iter()
                .filter(|l| l.ticket_id == ticket_id && scope.allows(l.company_id))
                .cloned()
                .collect();
            logs.sort_by_key(|l| l.created_at);
            Ok(logs)
        }
    }
}
