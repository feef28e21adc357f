//! Support Desk Domain
//!
//! Customers' problems are tracked as tickets owned by one company. A
//! ticket moves through `open → in_progress → resolved → closed` and can be
//! reopened once resolved or closed. Every change (creation, assignment,
//! status change, comment) appends a `TicketLog` row in the same write as
//! the change itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_support::{NewTicket, SupportService, TicketPriority, TicketStatus};
//!
//! let ticket = support.open_ticket(&ctx, company_id, operator, NewTicket::new("No internet", "Link down")).await?;
//! support.change_status(&ctx, technician, ticket.id, TicketStatus::InProgress).await?;
//! ```

pub mod error;
pub mod ports;
pub mod service;
pub mod ticket;

pub use error::SupportError;
pub use ports::{TicketChange, TicketFilter, TicketStore};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockTicketStore;
pub use service::SupportService;
pub use ticket::{NewTicket, Ticket, TicketAction, TicketLog, TicketPriority, TicketStats, TicketStatus};
