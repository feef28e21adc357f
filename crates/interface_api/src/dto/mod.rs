//! Request/response bodies that differ from the domain types
//!
//! Most endpoints accept and return domain types directly; the types here
//! cover query strings, wrapped bodies and summaries.

pub mod billing;
pub mod bulk;
pub mod gateway;
pub mod reseller;
pub mod support;

use serde::{Deserialize, Serialize};

use core_kernel::CompanyId;

/// Target company for super-admin calls; ignored on a tenant host
#[derive(Debug, Default, Deserialize)]
pub struct CompanyScope {
    pub company_id: Option<CompanyId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// Count of records a sweep created or changed
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}
