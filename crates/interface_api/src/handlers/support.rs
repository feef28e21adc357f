//! Support ticket handlers
//!
//! Any company user may open, move and comment on tickets; assigning a
//! ticket is an admin action.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{TenantContext, TicketId};
use domain_reseller::Principal;
use domain_support::{NewTicket, Ticket, TicketFilter, TicketLog, TicketStats};

use super::target_company;
use crate::auth::require_admin;
use crate::dto::support::{AssignRequest, CommentRequest, StatusRequest};
use crate::dto::CompanyScope;
use crate::{error::ApiError, AppState};

pub async fn open_ticket(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Query(scope): Query<CompanyScope>,
    Json(request): Json<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let company_id = target_company(&ctx, scope.company_id)?;
    let ticket = state
        .support
        .open_ticket(&ctx, company_id, principal.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    Ok(Json(state.support.list_tickets(&ctx, &filter).await?))
}

pub async fn ticket_stats(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
) -> Result<Json<TicketStats>, ApiError> {
    Ok(Json(state.support.ticket_stats(&ctx).await?))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<TicketId>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.support.get_ticket(&ctx, id).await?))
}

pub async fn assign_ticket(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<TicketId>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Ticket>, ApiError> {
    require_admin(&principal)?;
    let ticket = state
        .support
        .assign_ticket(&ctx, principal.user_id, id, request.assigned_to)
        .await?;
    Ok(Json(ticket))
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<TicketId>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state
        .support
        .change_status(&ctx, principal.user_id, id, request.status)
        .await?;
    Ok(Json(ticket))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<TicketId>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<TicketLog>), ApiError> {
    let log = state
        .support
        .add_comment(&ctx, principal.user_id, id, &request.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn ticket_logs(
    State(state): State<AppState>,
    Extension(ctx): Extension<TenantContext>,
    Path(id): Path<TicketId>,
) -> Result<Json<Vec<TicketLog>>, ApiError> {
    Ok(Json(state.support.ticket_logs(&ctx, id).await?))
}
