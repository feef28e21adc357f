//! Tickets, their workflow, and the activity log

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{CompanyId, CustomerId, TicketId, TicketLogId, UserId};

use crate::error::SupportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// Whether the workflow allows `self → next`
    ///
    /// Work only moves forward, except that a resolved or closed ticket may
    /// be reopened.
    pub fn can_move_to(self, next: TicketStatus) -> bool {
        use TicketStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | Resolved | Closed)
                | (InProgress, Resolved | Closed)
                | (Resolved, Closed | Open)
                | (Closed, Open)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(format!("unknown ticket status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "medium" => Ok(TicketPriority::Medium),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            other => Err(format!("unknown ticket priority: {}", other)),
        }
    }
}

/// What a log row records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketAction {
    Created,
    Assigned,
    StatusChanged,
    CommentAdded,
    Closed,
    Reopened,
}

impl TicketAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketAction::Created => "created",
            TicketAction::Assigned => "assigned",
            TicketAction::StatusChanged => "status_changed",
            TicketAction::CommentAdded => "comment_added",
            TicketAction::Closed => "closed",
            TicketAction::Reopened => "reopened",
        }
    }

    /// The action recorded for a move into `next`
    pub fn for_status(next: TicketStatus) -> Self {
        match next {
            TicketStatus::Closed => TicketAction::Closed,
            TicketStatus::Open => TicketAction::Reopened,
            TicketStatus::InProgress | TicketStatus::Resolved => TicketAction::StatusChanged,
        }
    }
}

impl FromStr for TicketAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(TicketAction::Created),
            "assigned" => Ok(TicketAction::Assigned),
            "status_changed" => Ok(TicketAction::StatusChanged),
            "comment_added" => Ok(TicketAction::CommentAdded),
            "closed" => Ok(TicketAction::Closed),
            "reopened" => Ok(TicketAction::Reopened),
            other => Err(format!("unknown ticket action: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub company_id: CompanyId,
    pub customer_id: Option<CustomerId>,
    pub assigned_to: Option<UserId>,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to open a ticket
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewTicket {
    pub customer_id: Option<CustomerId>,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[serde(default)]
    pub priority: TicketPriority,
}

impl NewTicket {
    pub fn new(subject: &str, description: &str) -> Self {
        Self {
            customer_id: None,
            category: "general".to_string(),
            subject: subject.to_string(),
            description: description.to_string(),
            priority: TicketPriority::default(),
        }
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn priority(mut self, priority: TicketPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }
}

impl Ticket {
    /// A new open ticket owned by `company_id`
    pub fn open(company_id: CompanyId, request: NewTicket, at: DateTime<Utc>) -> Self {
        Self {
            id: TicketId::new_v7(),
            company_id,
            customer_id: request.customer_id,
            assigned_to: None,
            category: request.category,
            subject: request.subject,
            description: request.description,
            priority: request.priority,
            status: TicketStatus::Open,
            created_at: at,
            updated_at: at,
        }
    }

    /// Moves to `next` and returns the status it left
    ///
    /// # Errors
    ///
    /// `InvalidTransition` when the workflow forbids the move, including a
    /// move to the current status.
    pub fn move_to(&mut self, next: TicketStatus, at: DateTime<Utc>) -> Result<TicketStatus, SupportError> {
        if !self.status.can_move_to(next) {
            return Err(SupportError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        self.updated_at = at;
        Ok(previous)
    }

    pub fn assign(&mut self, user_id: UserId, at: DateTime<Utc>) -> Result<(), SupportError> {
        self.ensure_not_closed()?;
        self.assigned_to = Some(user_id);
        self.updated_at = at;
        Ok(())
    }

    pub fn ensure_not_closed(&self) -> Result<(), SupportError> {
        if self.status == TicketStatus::Closed {
            return Err(SupportError::TicketClosed(self.id));
        }
        Ok(())
    }
}

/// One entry in a ticket's activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLog {
    pub id: TicketLogId,
    pub ticket_id: TicketId,
    pub company_id: CompanyId,
    pub user_id: UserId,
    pub action: TicketAction,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl TicketLog {
    pub fn record(ticket: &Ticket, user_id: UserId, action: TicketAction, description: impl Into<String>) -> Self {
        Self {
            id: TicketLogId::new_v7(),
            ticket_id: ticket.id,
            company_id: ticket.company_id,
            user_id,
            action,
            description: description.into(),
            created_at: ticket.updated_at,
        }
    }
}

/// Ticket counts for a support dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub closed: usize,
    pub by_priority: BTreeMap<TicketPriority, usize>,
    pub by_category: BTreeMap<String, usize>,
}

impl TicketStats {
    pub fn tally<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        tickets.into_iter().fold(Self::default(), |mut stats, ticket| {
            stats.total += 1;
            match ticket.status {
                TicketStatus::Open => stats.open += 1,
                TicketStatus::InProgress => stats.in_progress += 1,
                TicketStatus::Resolved => stats.resolved += 1,
                TicketStatus::Closed => stats.closed += 1,
            }
            *stats.by_priority.entry(ticket.priority).or_default() += 1;
            *stats.by_category.entry(ticket.category.clone()).or_default() += 1;
            stats
        })
    }
}
