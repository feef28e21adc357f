//! Support desk errors

use thiserror::Error;
use validator::ValidationErrors;

use core_kernel::{PortError, TenancyError, TicketId};

use crate::ticket::TicketStatus;

#[derive(Debug, Error)]
pub enum SupportError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The workflow does not allow this status change
    #[error("Ticket cannot move from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    /// Closed tickets take no comments or assignments until reopened
    #[error("Ticket {0} is closed")]
    TicketClosed(TicketId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    #[error(transparent)]
    Port(PortError),
}

impl From<PortError> for SupportError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound { entity_type, id } => SupportError::NotFound(format!("{} {}", entity_type, id)),
            PortError::Tenancy(err) => SupportError::Tenancy(err),
            other => SupportError::Port(other),
        }
    }
}

impl From<ValidationErrors> for SupportError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let codes: Vec<_> = errs.iter().map(|e| e.code.to_string()).collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect();
        messages.sort();
        SupportError::Validation(messages.join("; "))
    }
}
