//! Tenant filtering helpers shared by the adapters
//!
//! Reads bind the scope as a nullable uuid and filter with
//! `($n::uuid IS NULL OR company_id = $n)`, so a super-admin context
//! (no filter) and a tenant context share one statement.

use uuid::Uuid;

use core_kernel::{PortError, TenantContext};

/// The company filter for reads, `None` meaning every company
pub(crate) fn read_filter(ctx: &TenantContext) -> Result<Option<Uuid>, PortError> {
    Ok(ctx.read_scope()?.company_filter().map(Uuid::from))
}
