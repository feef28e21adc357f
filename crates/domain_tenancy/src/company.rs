//! Company (tenant root) model

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{CompanyId, Timezone};

use crate::config::CompanyDefaults;

/// Operating status of a company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Active,
    Inactive,
    Suspended,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyStatus::Active => "active",
            CompanyStatus::Inactive => "inactive",
            CompanyStatus::Suspended => "suspended",
        }
    }
}

impl std::str::FromStr for CompanyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CompanyStatus::Active),
            "inactive" => Ok(CompanyStatus::Inactive),
            "suspended" => Ok(CompanyStatus::Suspended),
            other => Err(format!("unknown company status: {}", other)),
        }
    }
}

/// An isolated ISP operator
///
/// Identified by exactly one of `domain` (a full host it owns) or
/// `subdomain` (a label under the platform's base domain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub domain: Option<String>,
    pub subdomain: Option<String>,
    pub status: CompanyStatus,
    /// Day of month invoices are generated, 1 through 28
    pub billing_day: u8,
    pub vat_percent: Decimal,
    pub currency: String,
    pub timezone: Timezone,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    /// Builds a company from a validated request, filling omitted settings
    pub fn from_request(request: NewCompany, defaults: &CompanyDefaults) -> Self {
        let now = Utc::now();
        Self {
            id: CompanyId::new_v7(),
            name: request.name,
            domain: normalize_key(request.domain),
            subdomain: normalize_key(request.subdomain),
            status: CompanyStatus::Active,
            billing_day: request.billing_day.unwrap_or(defaults.billing_day),
            vat_percent: request.vat_percent.unwrap_or(defaults.vat_percent),
            currency: request.currency.unwrap_or_else(|| defaults.currency.clone()),
            timezone: request.timezone.unwrap_or(defaults.timezone),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CompanyStatus::Active
    }

    /// Whether invoices are due on `today`, a date in the company's timezone
    pub fn is_billing_day(&self, today: NaiveDate) -> bool {
        today.day() == u32::from(self.billing_day)
    }

    /// Applies an update in place; host keys are normalised
    pub fn apply(&mut self, update: CompanyUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(domain) = update.domain {
            self.domain = normalize_key(Some(domain));
        }
        if let Some(subdomain) = update.subdomain {
            self.subdomain = normalize_key(Some(subdomain));
        }
        if let Some(day) = update.billing_day {
            self.billing_day = day;
        }
        if let Some(vat) = update.vat_percent {
            self.vat_percent = vat;
        }
        if let Some(currency) = update.currency {
            self.currency = currency;
        }
        if let Some(timezone) = update.timezone {
            self.timezone = timezone;
        }
        self.updated_at = Utc::now();
    }

    /// The host keys this company is reachable under
    pub fn host_keys(&self) -> impl Iterator<Item = &str> {
        self.domain.as_deref().into_iter().chain(self.subdomain.as_deref())
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_ascii_lowercase()).filter(|k| !k.is_empty())
}

/// Request to register a new company
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewCompany {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub domain: Option<String>,
    #[validate(length(max = 100))]
    pub subdomain: Option<String>,
    #[validate(range(min = 1, max = 28))]
    pub billing_day: Option<u8>,
    pub vat_percent: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub timezone: Option<Timezone>,
}

/// Partial update of a company's settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CompanyUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub domain: Option<String>,
    #[validate(length(max = 100))]
    pub subdomain: Option<String>,
    #[validate(range(min = 1, max = 28))]
    pub billing_day: Option<u8>,
    pub vat_percent: Option<Decimal>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub timezone: Option<Timezone>,
}
