//! Ticket workflow

use std::sync::Arc;

use tracing::info;
use validator::Validate;

use core_kernel::{Clock, CompanyId, TenantContext, TicketId, UserId};
use domain_billing::BillingStore;

use crate::error::SupportError;
use crate::ports::{TicketChange, TicketFilter, TicketStore};
use crate::ticket::{NewTicket, Ticket, TicketAction, TicketLog, TicketStats, TicketStatus};

const MAX_COMMENT_LEN: usize = 5000;

/// Opens, assigns, moves and comments on tickets
///
/// Every operation writes one log row attributed to `actor`.
#[derive(Clone)]
pub struct SupportService {
    store: Arc<dyn TicketStore>,
    customers: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
}

impl SupportService {
    pub fn new(store: Arc<dyn TicketStore>, customers: Arc<dyn BillingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, customers, clock }
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Opens a ticket for `company_id`
    ///
    /// # Errors
    ///
    /// * `Validation` - empty subject, description or category
    /// * `NotFound` - the named customer is not a customer of `company_id`
    pub async fn open_ticket(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        actor: UserId,
        request: NewTicket,
    ) -> Result<Ticket, SupportError> {
        request.validate()?;
        let company_id = ctx.stamp(company_id)?;

        if let Some(customer_id) = request.customer_id {
            let customer = self.customers.get_customer(ctx, customer_id).await?;
            if customer.company_id != company_id {
                return Err(SupportError::NotFound(format!("Customer {}", customer_id)));
            }
        }

        let ticket = Ticket::open(company_id, request, self.clock.now());
        let log = TicketLog::record(&ticket, actor, TicketAction::Created, "Ticket created");
        self.store.insert_ticket(ctx, &ticket, &log).await?;

        info!(
            company_id = %ticket.company_id,
            ticket_id = %ticket.id,
            priority = ticket.priority.as_str(),
            "ticket opened"
        );
        Ok(ticket)
    }

    pub async fn get_ticket(&self, ctx: &TenantContext, id: TicketId) -> Result<Ticket, SupportError> {
        Ok(self.store.get_ticket(ctx, id).await?)
    }

    pub async fn list_tickets(&self, ctx: &TenantContext, filter: &TicketFilter) -> Result<Vec<Ticket>, SupportError> {
        Ok(self.store.list_tickets(ctx, filter).await?)
    }

    pub async fn assign_ticket(
        &self,
        ctx: &TenantContext,
        actor: UserId,
        id: TicketId,
        assignee: UserId,
    ) -> Result<Ticket, SupportError> {
        let mut ticket = self.store.get_ticket(ctx, id).await?;
        let expected_status = ticket.status;
        ticket.assign(assignee, self.clock.now())?;

        let log = TicketLog::record(&ticket, actor, TicketAction::Assigned, format!("Ticket assigned to {}", assignee));
        self.store
            .update_ticket(ctx, &TicketChange { ticket: ticket.clone(), expected_status, log })
            .await?;

        info!(ticket_id = %ticket.id, assigned_to = %assignee, "ticket assigned");
        Ok(ticket)
    }

    /// Moves a ticket through the workflow
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` - the workflow forbids the move
    /// * `Port(Conflict)` - someone else moved the ticket since it was read
    pub async fn change_status(
        &self,
        ctx: &TenantContext,
        actor: UserId,
        id: TicketId,
        next: TicketStatus,
    ) -> Result<Ticket, SupportError> {
        let mut ticket = self.store.get_ticket(ctx, id).await?;
        let previous = ticket.move_to(next, self.clock.now())?;

        let description = match next {
            TicketStatus::Closed => "Ticket closed".to_string(),
            TicketStatus::Open => "Ticket reopened".to_string(),
            _ => format!("Status changed from {} to {}", previous, next),
        };
        let log = TicketLog::record(&ticket, actor, TicketAction::for_status(next), description);
        self.store
            .update_ticket(
                ctx,
                &TicketChange {
                    ticket: ticket.clone(),
                    expected_status: previous,
                    log,
                },
            )
            .await?;

        info!(ticket_id = %ticket.id, from = previous.as_str(), to = next.as_str(), "ticket status changed");
        Ok(ticket)
    }

    pub async fn close_ticket(&self, ctx: &TenantContext, actor: UserId, id: TicketId) -> Result<Ticket, SupportError> {
        self.change_status(ctx, actor, id, TicketStatus::Closed).await
    }

    pub async fn reopen_ticket(&self, ctx: &TenantContext, actor: UserId, id: TicketId) -> Result<Ticket, SupportError> {
        self.change_status(ctx, actor, id, TicketStatus::Open).await
    }

    /// Adds a comment to an open ticket's log
    pub async fn add_comment(
        &self,
        ctx: &TenantContext,
        actor: UserId,
        id: TicketId,
        comment: &str,
    ) -> Result<TicketLog, SupportError> {
        let comment = comment.trim();
        if comment.is_empty() || comment.len() > MAX_COMMENT_LEN {
            return Err(SupportError::Validation(format!(
                "comment must be 1 to {} characters",
                MAX_COMMENT_LEN
            )));
        }

        let ticket = self.store.get_ticket(ctx, id).await?;
        ticket.ensure_not_closed()?;

        let mut log = TicketLog::record(&ticket, actor, TicketAction::CommentAdded, comment);
        log.created_at = self.clock.now();
        self.store.insert_log(ctx, &log).await?;
        Ok(log)
    }

    pub async fn ticket_logs(&self, ctx: &TenantContext, id: TicketId) -> Result<Vec<TicketLog>, SupportError> {
        // Resolve the ticket first so an invisible ticket is NotFound, not empty
        self.store.get_ticket(ctx, id).await?;
        Ok(self.store.list_logs(ctx, id).await?)
    }

    /// Counts of the tickets visible in `ctx`
    pub async fn ticket_stats(&self, ctx: &TenantContext) -> Result<TicketStats, SupportError> {
        let tickets = self.store.list_tickets(ctx, &TicketFilter::default()).await?;
        Ok(TicketStats::tally(&tickets))
    }
}
