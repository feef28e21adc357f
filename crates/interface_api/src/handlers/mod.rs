//! Request handlers
//!
//! Handlers read the `TenantContext` and `Principal` the middleware placed in
//! the request extensions and pass them straight to the domain services.

pub mod billing;
pub mod bulk;
pub mod companies;
pub mod customers;
pub mod gateways;
pub mod health;
pub mod resellers;
pub mod support;

use core_kernel::{CompanyId, TenantContext};

use crate::error::ApiError;

/// The company a company-scoped call acts on
///
/// On a tenant host this is always the tenant, whatever was requested. On
/// the super-admin host the caller must name the company.
pub(crate) fn target_company(ctx: &TenantContext, requested: Option<CompanyId>) -> Result<CompanyId, ApiError> {
    ctx.read_scope()?;
    match (ctx.company_id(), requested) {
        (Some(tenant), _) => Ok(tenant),
        (None, Some(requested)) => Ok(ctx.stamp(requested)?),
        (None, None) => Err(ApiError::BadRequest(
            "company_id is required outside a company host".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_host_ignores_requested_company() {
        let tenant = CompanyId::new();
        let ctx = TenantContext::tenant(tenant);
        assert_eq!(target_company(&ctx, Some(CompanyId::new())).unwrap(), tenant);
    }

    #[test]
    fn test_super_admin_must_name_company() {
        let ctx = TenantContext::super_admin();
        let company = CompanyId::new();
        assert_eq!(target_company(&ctx, Some(company)).unwrap(), company);
        assert!(matches!(target_company(&ctx, None), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_uninitialized_context_is_forbidden() {
        assert!(matches!(
            target_company(&TenantContext::default(), Some(CompanyId::new())),
            Err(ApiError::Forbidden(_))
        ));
    }
}
