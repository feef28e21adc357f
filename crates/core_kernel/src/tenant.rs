//! Tenant context
//!
//! Every company-owned record (customers, packages, invoices, balances, ...)
//! is partitioned by `company_id`. The active tenant is an explicit value
//! resolved once per request or job and passed to every data-access call;
//! there is no process-wide "current company".
//!
//! Adapters apply the three rules below in exactly one place each:
//!
//! - [`TenantContext::stamp`] on insert: a tenant context overrides whatever
//!   `company_id` the caller supplied.
//! - [`TenantContext::authorize_write`] on update/delete: the stored owner
//!   must be the active tenant, otherwise [`TenancyError::CrossTenantViolation`].
//! - [`TenantContext::read_scope`] on queries: tenant reads are filtered to
//!   the tenant, super-admin reads are not.
//!
//! An uninitialized context fails closed for all three.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identifiers::CompanyId;

/// Errors raised by tenant scoping
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TenancyError {
    /// No tenant has been resolved for this call
    #[error("Tenant context is not initialized")]
    ContextMissing,

    /// A write targeted a record owned by another company
    #[error("Cross-tenant write rejected: active tenant {active}, record owner {owner}")]
    CrossTenantViolation {
        active: CompanyId,
        owner: CompanyId,
    },

    /// The request host did not identify any company
    #[error("Tenant not found for host: {0}")]
    TenantNotFound(String),

    /// The operation is reserved for the super-admin context
    #[error("Super-admin context required")]
    SuperAdminRequired,
}

/// The scope a query must be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadScope {
    /// Unfiltered (super-admin)
    All,
    /// Only rows owned by this company
    Company(CompanyId),
}

impl ReadScope {
    /// Returns true if a row owned by `owner` is visible in this scope
    pub fn allows(&self, owner: CompanyId) -> bool {
        match self {
            ReadScope::All => true,
            ReadScope::Company(id) => *id == owner,
        }
    }

    /// Returns the company filter to apply, if any
    pub fn company_filter(&self) -> Option<CompanyId> {
        match self {
            ReadScope::All => None,
            ReadScope::Company(id) => Some(*id),
        }
    }
}

/// The tenant a call is executing on behalf of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "company_id", rename_all = "snake_case")]
pub enum TenantContext {
    /// No request has been resolved yet
    #[default]
    Uninitialized,
    /// Bound to one company
    Tenant(CompanyId),
    /// Operating across all companies
    SuperAdmin,
}

impl TenantContext {
    pub fn tenant(company_id: CompanyId) -> Self {
        TenantContext::Tenant(company_id)
    }

    pub fn super_admin() -> Self {
        TenantContext::SuperAdmin
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, TenantContext::Uninitialized)
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, TenantContext::SuperAdmin)
    }

    /// Returns the bound company, if this is a tenant context
    pub fn company_id(&self) -> Option<CompanyId> {
        match self {
            TenantContext::Tenant(id) => Some(*id),
            _ => None,
        }
    }

    /// Resolves the `company_id` a new record must be stored under
    ///
    /// A tenant context always wins over `requested`; super-admin keeps the
    /// requested owner.
    pub fn stamp(&self, requested: CompanyId) -> Result<CompanyId, TenancyError> {
        match self {
            TenantContext::Uninitialized => Err(TenancyError::ContextMissing),
            TenantContext::Tenant(active) => Ok(*active),
            TenantContext::SuperAdmin => Ok(requested),
        }
    }

    /// Checks that a stored record owned by `owner` may be modified
    pub fn authorize_write(&self, owner: CompanyId) -> Result<(), TenancyError> {
        match self {
            TenantContext::Uninitialized => Err(TenancyError::ContextMissing),
            TenantContext::Tenant(active) if *active != owner => {
                Err(TenancyError::CrossTenantViolation {
                    active: *active,
                    owner,
                })
            }
            TenantContext::Tenant(_) | TenantContext::SuperAdmin => Ok(()),
        }
    }

    /// Returns the filter queries must apply
    pub fn read_scope(&self) -> Result<ReadScope, TenancyError> {
        match self {
            TenantContext::Uninitialized => Err(TenancyError::ContextMissing),
            TenantContext::Tenant(id) => Ok(ReadScope::Company(*id)),
            TenantContext::SuperAdmin => Ok(ReadScope::All),
        }
    }

    pub fn require_super_admin(&self) -> Result<(), TenancyError> {
        if self.is_super_admin() {
            Ok(())
        } else {
            Err(TenancyError::SuperAdminRequired)
        }
    }

    /// Narrows a super-admin context to one company for a unit of work
    ///
    /// Scheduled jobs iterate companies as super-admin and run each
    /// company's work inside that company's tenant context. A tenant
    /// context may only narrow to itself.
    pub fn narrow_to(&self, company_id: CompanyId) -> Result<TenantContext, TenancyError> {
        self.authorize_write(company_id)?;
        Ok(TenantContext::Tenant(company_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_overrides_requested_company() {
        let a = CompanyId::new();
        let b = CompanyId::new();
        assert_eq!(TenantContext::tenant(a).stamp(b).unwrap(), a);
        assert_eq!(TenantContext::super_admin().stamp(b).unwrap(), b);
    }

    #[test]
    fn test_uninitialized_fails_closed() {
        let ctx = TenantContext::default();
        let id = CompanyId::new();
        assert_eq!(ctx.stamp(id), Err(TenancyError::ContextMissing));
        assert_eq!(ctx.authorize_write(id), Err(TenancyError::ContextMissing));
        assert_eq!(ctx.read_scope(), Err(TenancyError::ContextMissing));
    }

    #[test]
    fn test_cross_tenant_write_rejected() {
        let a = CompanyId::new();
        let b = CompanyId::new();
        let err = TenantContext::tenant(a).authorize_write(b).unwrap_err();
        assert_eq!(err, TenancyError::CrossTenantViolation { active: a, owner: b });
        assert!(TenantContext::tenant(a).authorize_write(a).is_ok());
        assert!(TenantContext::super_admin().authorize_write(b).is_ok());
    }

    #[test]
    fn test_read_scope() {
        let a = CompanyId::new();
        let scope = TenantContext::tenant(a).read_scope().unwrap();
        assert!(scope.allows(a));
        assert!(!scope.allows(CompanyId::new()));
        assert!(TenantContext::super_admin().read_scope().unwrap().allows(a));
    }

    #[test]
    fn test_narrow_to() {
        let a = CompanyId::new();
        let b = CompanyId::new();
        assert_eq!(TenantContext::super_admin().narrow_to(a).unwrap(), TenantContext::tenant(a));
        assert!(TenantContext::tenant(a).narrow_to(b).is_err());
    }
}
