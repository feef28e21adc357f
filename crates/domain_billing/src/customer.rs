//! Subscribers
//!
//! A customer belongs to one company, is billed for one package, and may be
//! managed by a reseller. `customer_type` changes how billing treats them:
//!
//! - `free` customers are never invoiced and never expire-disabled
//! - `vip` customers are invoiced but never auto-disabled for nonpayment
//! - `home` and `corporate` follow the normal lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{CompanyId, CustomerId, PackageId, PopId, RouterId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    #[default]
    Home,
    Free,
    Vip,
    Corporate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    #[default]
    Active,
    Suspended,
    Expired,
    Disabled,
    Deleted,
}

macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($ty), ": {}"), other)),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use string_enum;

string_enum!(CustomerType {
    Home => "home",
    Free => "free",
    Vip => "vip",
    Corporate => "corporate",
});

string_enum!(CustomerStatus {
    Active => "active",
    Suspended => "suspended",
    Expired => "expired",
    Disabled => "disabled",
    Deleted => "deleted",
});

/// A subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub company_id: CompanyId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    /// PPPoE username, unique within the company
    pub username: String,
    /// PPPoE secret as provisioned on the router
    #[serde(skip_serializing, default)]
    pub ppp_password: String,
    pub nid: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub notes: Option<String>,
    pub package_id: Option<PackageId>,
    pub pop_id: Option<PopId>,
    pub router_id: Option<RouterId>,
    pub reseller_id: Option<UserId>,
    pub customer_type: CustomerType,
    pub status: CustomerStatus,
    pub activation_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Builds a customer from a validated request
    ///
    /// `company_id` is the caller's requested owner; the store stamps the
    /// active tenant over it on insert.
    pub fn from_request(company_id: CompanyId, request: NewCustomer, today: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: CustomerId::new_v7(),
            company_id,
            name: request.name.trim().to_string(),
            phone: request.phone.trim().to_string(),
            email: request.email.filter(|e| !e.trim().is_empty()),
            username: request.username.trim().to_string(),
            ppp_password: request.password,
            nid: request.nid,
            ip_address: request.ip_address,
            mac_address: request.mac_address,
            notes: request.notes,
            package_id: request.package_id,
            pop_id: request.pop_id,
            router_id: request.router_id,
            reseller_id: request.reseller_id,
            customer_type: request.customer_type.unwrap_or_default(),
            status: CustomerStatus::Active,
            activation_date: Some(today),
            expiry_date: request.expiry_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_free(&self) -> bool {
        self.customer_type == CustomerType::Free
    }

    pub fn is_vip(&self) -> bool {
        self.customer_type == CustomerType::Vip
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Request to register a customer (API form or one CSV row)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 255, message = "name is required (max 255)"))]
    pub name: String,
    #[validate(length(min = 1, max = 20, message = "phone is required (max 20)"))]
    pub phone: String,
    #[validate(email(message = "email is invalid"), length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100, message = "username is required (max 100)"))]
    pub username: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    pub package_id: Option<PackageId>,
    pub pop_id: Option<PopId>,
    pub router_id: Option<RouterId>,
    pub reseller_id: Option<UserId>,
    pub customer_type: Option<CustomerType>,
    pub nid: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub notes: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Partial update of a customer's editable fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CustomerUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub package_id: Option<PackageId>,
    pub reseller_id: Option<UserId>,
    pub customer_type: Option<CustomerType>,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

impl CustomerUpdate {
    pub fn apply_to(self, customer: &mut Customer) {
        if let Some(name) = self.name {
            customer.name = name;
        }
        if let Some(phone) = self.phone {
            customer.phone = phone;
        }
        if let Some(email) = self.email {
            customer.email = Some(email);
        }
        if let Some(package_id) = self.package_id {
            customer.package_id = Some(package_id);
        }
        if let Some(reseller_id) = self.reseller_id {
            customer.reseller_id = Some(reseller_id);
        }
        if let Some(customer_type) = self.customer_type {
            customer.customer_type = customer_type;
        }
        if let Some(status) = self.status {
            customer.status = status;
        }
        if let Some(notes) = self.notes {
            customer.notes = Some(notes);
        }
        customer.touch();
    }
}

/// Filter for customer listings; the tenant filter is applied separately
#[derive(Debug, Clone, Default)]
pub struct CustomerQuery {
    pub company_id: Option<CompanyId>,
    pub status: Option<CustomerStatus>,
    pub reseller_id: Option<UserId>,
    pub expiring_on: Option<NaiveDate>,
    /// Matches an expiry strictly before this date, or no expiry at all
    pub expired_before: Option<NaiveDate>,
    pub limit: Option<u32>,
}

impl CustomerQuery {
    pub fn active_in(company_id: CompanyId) -> Self {
        Self {
            company_id: Some(company_id),
            status: Some(CustomerStatus::Active),
            ..Default::default()
        }
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        self.company_id.map_or(true, |c| customer.company_id == c)
            && self.status.map_or(true, |s| customer.status == s)
            && self.reseller_id.map_or(true, |r| customer.reseller_id == Some(r))
            && self.expiring_on.map_or(true, |d| customer.expiry_date == Some(d))
            && self
                .expired_before
                .map_or(true, |d| customer.expiry_date.map_or(true, |e| e < d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> NewCustomer {
        NewCustomer {
            name: "Rahim Uddin".to_string(),
            phone: "01711000000".to_string(),
            email: Some("rahim@example.com".to_string()),
            username: "rahim".to_string(),
            password: "secret1".to_string(),
            package_id: Some(PackageId::new()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_field_rules() {
        let mut req = valid_request();
        req.password = "123".to_string();
        req.phone = "0".repeat(21);
        req.email = Some("not-an-email".to_string());
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("phone"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_from_request_defaults() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let customer = Customer::from_request(CompanyId::new(), valid_request(), today);
        assert_eq!(customer.customer_type, CustomerType::Home);
        assert_eq!(customer.status, CustomerStatus::Active);
        assert_eq!(customer.activation_date, Some(today));
    }

    #[test]
    fn test_password_not_serialized() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let customer = Customer::from_request(CompanyId::new(), valid_request(), today);
        let json = serde_json::to_value(&customer).unwrap();
        assert!(json.get("ppp_password").is_none());
    }

    #[test]
    fn test_string_enums() {
        assert_eq!("vip".parse::<CustomerType>().unwrap(), CustomerType::Vip);
        assert_eq!(CustomerStatus::Expired.to_string(), "expired");
        assert!("gold".parse::<CustomerType>().is_err());
    }

    #[test]
    fn test_query_expired_before() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut customer = Customer::from_request(CompanyId::new(), valid_request(), today);
        let query = CustomerQuery {
            expired_before: Some(today),
            ..Default::default()
        };
        customer.expiry_date = NaiveDate::from_ymd_opt(2025, 3, 9);
        assert!(query.matches(&customer));
        customer.expiry_date = Some(today);
        assert!(!query.matches(&customer));
        customer.expiry_date = None;
        assert!(query.matches(&customer));
    }
}
