//! Customer and package management
//!
//! `CustomerService` owns the single-customer creation rules. Bulk import
//! runs every CSV row through `check_new_customer`, so a row is accepted
//! exactly when the API would accept the same customer.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};
use validator::Validate;

use core_kernel::{Clock, CompanyId, CustomerId, TenantContext, UserId};
use domain_tenancy::CompanyDirectory;

use crate::commission::ResellerProfile;
use crate::customer::{Customer, CustomerQuery, CustomerUpdate, NewCustomer};
use crate::error::BillingError;
use crate::package::{NewPackage, Package};
use crate::ports::BillingStore;

#[derive(Clone)]
pub struct CustomerService {
    store: Arc<dyn BillingStore>,
    companies: Arc<dyn CompanyDirectory>,
    clock: Arc<dyn Clock>,
}

impl CustomerService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        companies: Arc<dyn CompanyDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            companies,
            clock,
        }
    }

    /// Validates a new customer without writing anything
    ///
    /// Field rules, then username and email uniqueness within the company,
    /// then existence of the referenced package.
    pub async fn check_new_customer(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        request: &NewCustomer,
    ) -> Result<(), BillingError> {
        request.validate()?;
        let company_id = ctx.stamp(company_id)?;

        let username = request.username.trim();
        if self
            .store
            .find_customer_by_username(ctx, company_id, username)
            .await?
            .is_some()
        {
            return Err(BillingError::Duplicate {
                field: "username",
                value: username.to_string(),
            });
        }

        if let Some(email) = request.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            if self.store.email_taken(ctx, company_id, email).await? {
                return Err(BillingError::Duplicate {
                    field: "email",
                    value: email.to_string(),
                });
            }
        }

        if let Some(package_id) = request.package_id {
            self.store.get_package(ctx, package_id).await?;
        }
        Ok(())
    }

    /// Registers a customer under the active tenant
    pub async fn create_customer(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        request: NewCustomer,
    ) -> Result<Customer, BillingError> {
        self.check_new_customer(ctx, company_id, &request).await?;

        let company = self.companies.get_company(ctx.stamp(company_id)?).await?;
        let today = self.clock.today_in(company.timezone);
        let customer = Customer::from_request(company.id, request, today);
        let stored = self.store.insert_customer(ctx, &customer).await?;

        info!(
            company_id = %stored.company_id,
            customer_id = %stored.id,
            username = %stored.username,
            "customer created"
        );
        Ok(stored)
    }

    pub async fn get_customer(&self, ctx: &TenantContext, id: CustomerId) -> Result<Customer, BillingError> {
        Ok(self.store.get_customer(ctx, id).await?)
    }

    pub async fn list_customers(
        &self,
        ctx: &TenantContext,
        query: &CustomerQuery,
    ) -> Result<Vec<Customer>, BillingError> {
        Ok(self.store.list_customers(ctx, query).await?)
    }

    /// Applies a partial update to a visible customer
    pub async fn update_customer(
        &self,
        ctx: &TenantContext,
        id: CustomerId,
        update: CustomerUpdate,
    ) -> Result<Customer, BillingError> {
        update.validate()?;
        let mut customer = self.store.get_customer(ctx, id).await?;
        if let Some(package_id) = update.package_id {
            self.store.get_package(ctx, package_id).await?;
        }
        update.apply_to(&mut customer);
        self.save_customer(ctx, &customer).await?;
        Ok(customer)
    }

    /// Writes a full customer record back to the store
    ///
    /// The store rejects the write with `CrossTenantViolation` if the
    /// stored owner differs from the active tenant.
    pub async fn save_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<(), BillingError> {
        self.store.update_customer(ctx, customer).await?;
        debug!(customer_id = %customer.id, "customer saved");
        Ok(())
    }

    /// Creates a package; a zero price is allowed (free and expired plans)
    pub async fn create_package(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        request: NewPackage,
    ) -> Result<Package, BillingError> {
        request.validate()?;
        if request.price < Decimal::ZERO {
            return Err(BillingError::InvalidAmount(request.price));
        }
        let package = Package::from_request(ctx.stamp(company_id)?, request);
        Ok(self.store.insert_package(ctx, &package).await?)
    }

    pub async fn list_packages(&self, ctx: &TenantContext) -> Result<Vec<Package>, BillingError> {
        Ok(self.store.list_packages(ctx).await?)
    }

    /// Sets a reseller's commission rate; existing commissions keep theirs
    pub async fn set_commission_percent(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        reseller_id: UserId,
        percent: Option<Decimal>,
    ) -> Result<(), BillingError> {
        if let Some(p) = percent {
            if p < Decimal::ZERO || p > Decimal::ONE_HUNDRED {
                return Err(BillingError::Validation(format!(
                    "commission_percent: must be between 0 and 100, got {}",
                    p
                )));
            }
        }
        let profile = ResellerProfile {
            user_id: reseller_id,
            company_id: ctx.stamp(company_id)?,
            commission_percent: percent,
        };
        self.store.save_reseller_profile(ctx, &profile).await?;
        Ok(())
    }
}
