//! PostgreSQL adapters for the domain ports
//!
//! Each adapter implements one port trait over a shared `PgPool`. Row
//! structs mirror the table layout and convert into domain types; a value
//! that no longer parses (an unknown status string, a bad timezone) is
//! reported as `DatabaseError::CorruptRow` rather than silently defaulted.
//!
//! Tenant rules are enforced here, inside the statements:
//!
//! - inserts write `ctx.stamp(requested)` as the owner
//! - updates lock the row, read its owner, and call `ctx.authorize_write`
//! - reads filter by `ctx.read_scope()`

use std::str::FromStr;
use std::time::Instant;

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, HealthCheckResult, PortError};

use crate::error::DatabaseError;

pub mod billing;
pub mod bulk;
pub mod company;
pub mod gateway;
pub mod ledger;
pub mod sms;
pub mod support;

pub use billing::PostgresBillingStore;
pub use bulk::PostgresBulkStore;
pub use company::PostgresCompanyDirectory;
pub use gateway::PostgresGatewayAuditStore;
pub use ledger::PostgresLedgerStore;
pub use sms::PostgresSmsStore;
pub use support::PostgresTicketStore;

/// Runs `SELECT 1` and reports latency
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, message) = match result {
        Ok(_) => (AdapterHealth::Healthy, None),
        Err(e) => (AdapterHealth::Unhealthy, Some(format!("Database error: {}", e))),
    };
    HealthCheckResult {
        adapter_id: adapter_id.to_string(),
        status,
        latency_ms,
        message,
        checked_at: Utc::now(),
    }
}

/// Parses a stored enum string
pub(crate) fn parse_column<T>(table: &'static str, value: &str) -> Result<T, PortError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| DatabaseError::corrupt(table, e).into())
}

/// Converts a stored integer count into its domain width
pub(crate) fn to_u32(table: &'static str, value: i32) -> Result<u32, PortError> {
    u32::try_from(value).map_err(|e| DatabaseError::corrupt(table, e).into())
}
