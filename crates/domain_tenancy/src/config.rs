//! Tenancy configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::Timezone;

/// Host-resolution settings and the defaults applied to new companies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Exact host that selects the super-admin context
    pub super_admin_domain: String,
    /// Suffix under which company subdomains live
    pub base_domain: String,
    pub default_billing_day: u8,
    pub default_vat_percent: Decimal,
    pub default_currency: String,
    pub default_timezone: Timezone,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            super_admin_domain: "admin.example.com".to_string(),
            base_domain: "example.com".to_string(),
            default_billing_day: 10,
            default_vat_percent: Decimal::ZERO,
            default_currency: "BDT".to_string(),
            default_timezone: Timezone::new(chrono_tz::Asia::Dhaka),
        }
    }
}

impl TenancyConfig {
    /// Returns the defaults stamped onto companies that omit them
    pub fn company_defaults(&self) -> CompanyDefaults {
        CompanyDefaults {
            billing_day: self.default_billing_day,
            vat_percent: self.default_vat_percent,
            currency: self.default_currency.clone(),
            timezone: self.default_timezone,
        }
    }
}

/// Defaults for a newly created company
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyDefaults {
    pub billing_day: u8,
    pub vat_percent: Decimal,
    pub currency: String,
    pub timezone: Timezone,
}
