//! Support desk DTOs

use serde::Deserialize;

use core_kernel::UserId;
use domain_support::TicketStatus;

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: UserId,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub comment: String,
}
