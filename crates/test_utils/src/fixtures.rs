//! Pre-built Test Fixtures
//!
//! Consistent, predictable data for unit and scenario tests: a fixed
//! "today", a tenancy configuration under `isp.test`, two companies and the
//! principals that act in them.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;

use core_kernel::{CompanyId, UserId};
use domain_reseller::{Principal, Role};
use domain_tenancy::{Company, NewCompany, TenancyConfig};

/// Host suffix for company subdomains in tests
pub const BASE_DOMAIN: &str = "isp.test";

/// Host that selects the super-admin context in tests
pub const SUPER_ADMIN_HOST: &str = "admin.isp.test";

/// Tenancy settings shared by every test platform
pub static TENANCY: Lazy<TenancyConfig> = Lazy::new(|| TenancyConfig {
    super_admin_domain: SUPER_ADMIN_HOST.to_string(),
    base_domain: BASE_DOMAIN.to_string(),
    default_billing_day: 10,
    default_vat_percent: dec!(5),
    ..TenancyConfig::default()
});

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The date every mock clock starts at (mid-month, after the billing day)
    pub fn today() -> NaiveDate {
        Self::date(2025, 1, 15)
    }

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
    }
}

/// Fixture for companies
pub struct CompanyFixtures;

impl CompanyFixtures {
    /// An active company reachable at `<subdomain>.isp.test`
    pub fn with_subdomain(name: &str, subdomain: &str) -> Company {
        Company::from_request(
            NewCompany {
                name: name.to_string(),
                subdomain: Some(subdomain.to_string()),
                ..Default::default()
            },
            &TENANCY.company_defaults(),
        )
    }

    pub fn alpha() -> Company {
        Self::with_subdomain("Alpha Net", "alpha")
    }

    pub fn beta() -> Company {
        Self::with_subdomain("Beta Fiber", "beta")
    }

    /// The host a company's users browse to
    pub fn host(company: &Company) -> String {
        match (&company.domain, &company.subdomain) {
            (Some(domain), _) => domain.clone(),
            (None, Some(subdomain)) => format!("{}.{}", subdomain, BASE_DOMAIN),
            (None, None) => SUPER_ADMIN_HOST.to_string(),
        }
    }
}

/// Fixture for authenticated principals
pub struct PrincipalFixtures;

impl PrincipalFixtures {
    pub fn super_admin() -> Principal {
        Principal::new(UserId::new(), None, Role::SuperAdmin)
    }

    pub fn admin(company_id: CompanyId) -> Principal {
        Principal::new(UserId::new(), Some(company_id), Role::Admin)
    }

    pub fn operator(company_id: CompanyId) -> Principal {
        Principal::new(UserId::new(), Some(company_id), Role::Operator)
    }

    pub fn reseller(company_id: CompanyId) -> Principal {
        Principal::new(UserId::new(), Some(company_id), Role::Reseller)
    }

    pub fn employee(company_id: CompanyId) -> Principal {
        Principal::new(UserId::new(), Some(company_id), Role::ResellerEmployee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_hosts() {
        let alpha = CompanyFixtures::alpha();
        assert_eq!(CompanyFixtures::host(&alpha), "alpha.isp.test");
        assert_eq!(alpha.billing_day, 10);
        assert_eq!(alpha.vat_percent, dec!(5));
    }

    #[test]
    fn test_principal_roles() {
        let company = CompanyId::new();
        assert!(PrincipalFixtures::admin(company).role.is_admin());
        assert!(!PrincipalFixtures::reseller(company).role.is_admin());
        assert_eq!(PrincipalFixtures::super_admin().company_id, None);
    }
}
