//! Test Data Builders
//!
//! Builders for rows seeded straight into the mocks. Only the fields a test
//! cares about need setting; names and phone numbers are faked.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::NaiveDate;
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CompanyId, RouterId, UserId};
use domain_billing::{Customer, CustomerStatus, CustomerType, NewCustomer, NewPackage, Package};

use crate::fixtures::TemporalFixtures;

static USERNAME_SEQ: AtomicU32 = AtomicU32::new(1);

/// Builder for packages
pub struct PackageBuilder {
    company_id: CompanyId,
    request: NewPackage,
}

impl PackageBuilder {
    /// A 30-day package priced 500.00 using the company VAT rate
    pub fn new(company_id: CompanyId) -> Self {
        Self {
            company_id,
            request: NewPackage {
                name: "Home 10 Mbps".to_string(),
                price: dec!(500.00),
                vat_percent: None,
                duration_days: Some(30),
                profile: Some("home-10m".to_string()),
                is_expired_package: false,
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.request.name = name.into();
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.request.price = price;
        self
    }

    pub fn vat_percent(mut self, vat: Decimal) -> Self {
        self.request.vat_percent = Some(vat);
        self
    }

    pub fn duration_days(mut self, days: u32) -> Self {
        self.request.duration_days = Some(days);
        self
    }

    /// Marks the package as the degraded plan for expired customers
    pub fn expired_plan(mut self) -> Self {
        self.request.is_expired_package = true;
        self
    }

    pub fn build(self) -> Package {
        Package::from_request(self.company_id, self.request)
    }
}

/// Builder for customers
pub struct CustomerBuilder {
    company_id: CompanyId,
    request: NewCustomer,
    status: CustomerStatus,
}

impl CustomerBuilder {
    /// An active home customer with a unique username and no package
    pub fn new(company_id: CompanyId) -> Self {
        let seq = USERNAME_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            company_id,
            request: NewCustomer {
                name: Name().fake(),
                phone: format!("017{:08}", (0..100_000_000u32).fake::<u32>()),
                username: format!("user{}", seq),
                password: "secret123".to_string(),
                ..Default::default()
            },
            status: CustomerStatus::Active,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.request.username = username.into();
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.request.phone = phone.into();
        self
    }

    pub fn package(mut self, package: &Package) -> Self {
        self.request.package_id = Some(package.id);
        self
    }

    pub fn reseller(mut self, reseller_id: UserId) -> Self {
        self.request.reseller_id = Some(reseller_id);
        self
    }

    pub fn router(mut self, router_id: RouterId) -> Self {
        self.request.router_id = Some(router_id);
        self
    }

    pub fn customer_type(mut self, customer_type: CustomerType) -> Self {
        self.request.customer_type = Some(customer_type);
        self
    }

    pub fn expiry(mut self, date: NaiveDate) -> Self {
        self.request.expiry_date = Some(date);
        self
    }

    pub fn status(mut self, status: CustomerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn build(self) -> Customer {
        let mut customer = Customer::from_request(self.company_id, self.request, TemporalFixtures::today());
        customer.status = self.status;
        customer
    }

    /// The request form, for going through `CustomerService`
    pub fn request(self) -> NewCustomer {
        self.request
    }
}
