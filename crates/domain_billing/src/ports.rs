//! Billing Domain Ports
//!
//! `BillingStore` is the storage port for every tenant-owned billing
//! record. Each method takes the caller's `TenantContext`; adapters stamp
//! it on insert, check it against the stored owner on update, and filter
//! reads by it.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{
    CompanyId, CustomerId, DomainPort, HealthCheckable, InvoiceId, PackageId, PortError,
    TenantContext, UserId,
};

use crate::commission::{CommissionStatus, ResellerCommission, ResellerProfile};
use crate::customer::{Customer, CustomerQuery};
use crate::invoice::{Invoice, InvoiceQuery};
use crate::package::Package;
use crate::payment::Payment;

/// Writes that make up one recorded payment, applied atomically
///
/// The invoice named by `payment.invoice_id` is reconciled by the store
/// while it holds that invoice's row lock, against the payments already
/// recorded plus this one.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub payment: Payment,
    pub commission: Option<ResellerCommission>,
}

/// A payment as stored, with its invoice after reconciliation
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub invoice: Option<Invoice>,
}

/// Storage port for customers, packages, invoices, payments and commissions
#[async_trait]
pub trait BillingStore: DomainPort + HealthCheckable {
    // Customers

    async fn get_customer(&self, ctx: &TenantContext, id: CustomerId) -> Result<Customer, PortError>;

    async fn find_customer_by_username(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        username: &str,
    ) -> Result<Option<Customer>, PortError>;

    async fn email_taken(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        email: &str,
    ) -> Result<bool, PortError>;

    /// Inserts a customer, returning it as stored (with the stamped owner)
    async fn insert_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<Customer, PortError>;

    /// Replaces a stored customer
    ///
    /// Fails with `CrossTenantViolation` when the stored owner is not the
    /// active tenant; nothing is written in that case.
    async fn update_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<(), PortError>;

    async fn list_customers(&self, ctx: &TenantContext, query: &CustomerQuery) -> Result<Vec<Customer>, PortError>;

    // Packages

    async fn get_package(&self, ctx: &TenantContext, id: PackageId) -> Result<Package, PortError>;

    async fn insert_package(&self, ctx: &TenantContext, package: &Package) -> Result<Package, PortError>;

    /// The company's designated expired package, if one is marked
    async fn find_expired_package(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<Option<Package>, PortError>;

    async fn list_packages(&self, ctx: &TenantContext) -> Result<Vec<Package>, PortError>;

    // Invoices

    /// Atomically increments and returns the company's invoice counter for `date`
    async fn allocate_invoice_sequence(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        date: NaiveDate,
    ) -> Result<u32, PortError>;

    async fn insert_invoice(&self, ctx: &TenantContext, invoice: &Invoice) -> Result<Invoice, PortError>;

    async fn get_invoice(&self, ctx: &TenantContext, id: InvoiceId) -> Result<Invoice, PortError>;

    async fn list_invoices(&self, ctx: &TenantContext, query: &InvoiceQuery) -> Result<Vec<Invoice>, PortError>;

    async fn has_unpaid_invoices(&self, ctx: &TenantContext, customer_id: CustomerId) -> Result<bool, PortError>;

    // Payments

    /// Writes a payment together with its invoice update and commission
    ///
    /// Fails with `Conflict` when the invoice is already paid or cancelled
    /// at write time; nothing is written in that case.
    async fn record_payment(&self, ctx: &TenantContext, record: &PaymentRecord)
        -> Result<RecordedPayment, PortError>;

    async fn payments_total_for_invoice(
        &self,
        ctx: &TenantContext,
        invoice_id: InvoiceId,
    ) -> Result<Decimal, PortError>;

    async fn list_payments(
        &self,
        ctx: &TenantContext,
        customer_id: Option<CustomerId>,
    ) -> Result<Vec<Payment>, PortError>;

    // Resellers and commissions

    async fn get_reseller_profile(
        &self,
        ctx: &TenantContext,
        user_id: UserId,
    ) -> Result<Option<ResellerProfile>, PortError>;

    async fn save_reseller_profile(&self, ctx: &TenantContext, profile: &ResellerProfile) -> Result<(), PortError>;

    async fn insert_commission(
        &self,
        ctx: &TenantContext,
        commission: &ResellerCommission,
    ) -> Result<ResellerCommission, PortError>;

    async fn list_commissions(
        &self,
        ctx: &TenantContext,
        reseller_id: Option<UserId>,
        status: Option<CommissionStatus>,
    ) -> Result<Vec<ResellerCommission>, PortError>;
}

/// In-memory adapter for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, CommissionId, HealthCheckResult, PaymentId};

    pub type Shared<K, V> = Arc<RwLock<HashMap<K, V>>>;

    /// In-memory mock implementation of BillingStore
    ///
    /// Tables are shared handles so sibling mocks (ledger, bulk) can see the
    /// same rows.
    #[derive(Debug, Default, Clone)]
    pub struct MockBillingStore {
        pub customers: Shared<CustomerId, Customer>,
        pub packages: Shared<PackageId, Package>,
        pub invoices: Shared<InvoiceId, Invoice>,
        pub payments: Shared<PaymentId, Payment>,
        pub profiles: Shared<UserId, ResellerProfile>,
        pub commissions: Shared<CommissionId, ResellerCommission>,
        sequences: Shared<(CompanyId, NaiveDate), u32>,
    }

    impl MockBillingStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts rows as-is, bypassing tenant stamping
        pub async fn seed_customer(&self, customer: Customer) {
            self.customers.write().await.insert(customer.id, customer);
        }

        pub async fn seed_package(&self, package: Package) {
            self.packages.write().await.insert(package.id, package);
        }

        pub async fn seed_invoice(&self, invoice: Invoice) {
            self.invoices.write().await.insert(invoice.id, invoice);
        }

        /// Reads a customer without tenant filtering
        pub async fn raw_customer(&self, id: CustomerId) -> Option<Customer> {
            self.customers.read().await.get(&id).cloned()
        }
    }

    impl DomainPort for MockBillingStore {}

    #[async_trait]
    impl HealthCheckable for MockBillingStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-billing-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BillingStore for MockBillingStore {
        async fn get_customer(&self, ctx: &TenantContext, id: CustomerId) -> Result<Customer, PortError> {
            let scope = ctx.read_scope()?;
            self.customers
                .read()
                .await
                .get(&id)
                .filter(|c| scope.allows(c.company_id))
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))
        }

        async fn find_customer_by_username(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
            username: &str,
        ) -> Result<Option<Customer>, PortError> {
            let scope = ctx.read_scope()?;
            Ok(self
                .customers
                .read()
                .await
                .values()
                .find(|c| scope.allows(c.company_id) && c.company_id == company_id && c.username == username)
                .cloned())
        }

        async fn email_taken(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
            email: &str,
        ) -> Result<bool, PortError> {
            let scope = ctx.read_scope()?;
            Ok(self.customers.read().await.values().any(|c| {
                scope.allows(c.company_id)
                    && c.company_id == company_id
                    && c.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))
            }))
        }

        async fn insert_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<Customer, PortError> {
            let mut stored = customer.clone();
            stored.company_id = ctx.stamp(customer.company_id)?;

            let mut customers = self.customers.write().await;
            if customers
                .values()
                .any(|c| c.company_id == stored.company_id && c.username == stored.username)
            {
                return Err(PortError::conflict(format!("username {} exists", stored.username)));
            }
            customers.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn update_customer(&self, ctx: &TenantContext, customer: &Customer) -> Result<(), PortError> {
            let mut customers = self.customers.write().await;
            let stored = customers
                .get_mut(&customer.id)
                .ok_or_else(|| PortError::not_found("Customer", customer.id))?;
            ctx.authorize_write(stored.company_id)?;

            let owner = stored.company_id;
            *stored = customer.clone();
            stored.company_id = owner;
            Ok(())
        }

        async fn list_customers(&self, ctx: &TenantContext, query: &CustomerQuery) -> Result<Vec<Customer>, PortError> {
            let scope = ctx.read_scope()?;
            let customers = self.customers.read().await;
            let mut result: Vec<_> = customers
                .values()
                .filter(|c| scope.allows(c.company_id) && query.matches(c))
                .cloned()
                .collect();
            result.sort_by_key(|c| c.created_at);
            if let Some(limit) = query.limit {
                result.truncate(limit as usize);
            }
            Ok(result)
        }

        async fn get_package(&self, ctx: &TenantContext, id: PackageId) -> Result<Package, PortError> {
            let scope = ctx.read_scope()?;
            self.packages
                .read()
                .await
                .get(&id)
                .filter(|p| scope.allows(p.company_id))
                .cloned()
                .ok_or_else(|| PortError::not_found("Package", id))
        }

        async fn insert_package(&self, ctx: &TenantContext, package: &Package) -> Result<Package, PortError> {
            let mut stored = package.clone();
            stored.company_id = ctx.stamp(package.company_id)?;
            self.packages.write().await.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn find_expired_package(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
        ) -> Result<Option<Package>, PortError> {
            let scope = ctx.read_scope()?;
            let packages = self.packages.read().await;
            let mut candidates: Vec<_> = packages
                .values()
                .filter(|p| scope.allows(p.company_id) && p.company_id == company_id && p.is_expired_package)
                .collect();
            candidates.sort_by_key(|p| p.created_at);
            Ok(candidates.first().map(|p| (*p).clone()))
        }

        async fn list_packages(&self, ctx: &TenantContext) -> Result<Vec<Package>, PortError> {
            let scope = ctx.read_scope()?;
            let mut result: Vec<_> = self
                .packages
                .read()
                .await
                .values()
                .filter(|p| scope.allows(p.company_id))
                .cloned()
                .collect();
            result.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(result)
        }

        async fn allocate_invoice_sequence(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
            date: NaiveDate,
        ) -> Result<u32, PortError> {
            ctx.authorize_write(company_id)?;
            let mut sequences = self.sequences.write().await;
            let next = sequences.entry((company_id, date)).or_insert(0);
            *next += 1;
            Ok(*next)
        }

        async fn insert_invoice(&self, ctx: &TenantContext, invoice: &Invoice) -> Result<Invoice, PortError> {
            let mut stored = invoice.clone();
            stored.company_id = ctx.stamp(invoice.company_id)?;

            let mut invoices = self.invoices.write().await;
            if invoices.values().any(|i| i.invoice_number == stored.invoice_number) {
                return Err(PortError::conflict(format!(
                    "invoice number {} exists",
                    stored.invoice_number
                )));
            }
            invoices.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn get_invoice(&self, ctx: &TenantContext, id: InvoiceId) -> Result<Invoice, PortError> {
            let scope = ctx.read_scope()?;
            self.invoices
                .read()
                .await
                .get(&id)
                .filter(|i| scope.allows(i.company_id))
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn list_invoices(&self, ctx: &TenantContext, query: &InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
            let scope = ctx.read_scope()?;
            let mut result: Vec<_> = self
                .invoices
                .read()
                .await
                .values()
                .filter(|i| scope.allows(i.company_id) && query.matches(i))
                .cloned()
                .collect();
            result.sort_by(|a, b| b.invoice_number.cmp(&a.invoice_number));
            if let Some(limit) = query.limit {
                result.truncate(limit as usize);
            }
            Ok(result)
        }

        async fn has_unpaid_invoices(&self, ctx: &TenantContext, customer_id: CustomerId) -> Result<bool, PortError> {
            let scope = ctx.read_scope()?;
            Ok(self.invoices.read().await.values().any(|i| {
                scope.allows(i.company_id)
                    && i.customer_id == customer_id
                    && i.status == crate::invoice::InvoiceStatus::Unpaid
            }))
        }

        async fn record_payment(
            &self,
            ctx: &TenantContext,
            record: &PaymentRecord,
        ) -> Result<RecordedPayment, PortError> {
            let mut payment = record.payment.clone();
            payment.company_id = ctx.stamp(payment.company_id)?;
            let commission = match &record.commission {
                Some(c) => {
                    let mut c = c.clone();
                    c.company_id = ctx.stamp(c.company_id)?;
                    Some(c)
                }
                None => None,
            };

            // The invoices write guard is held until every row is written
            let mut invoices = self.invoices.write().await;
            let invoice = match payment.invoice_id {
                Some(invoice_id) => {
                    let mut invoice = invoices
                        .get(&invoice_id)
                        .cloned()
                        .ok_or_else(|| PortError::not_found("Invoice", invoice_id))?;
                    ctx.authorize_write(invoice.company_id)?;
                    let paid: Decimal = self
                        .payments
                        .read()
                        .await
                        .values()
                        .filter(|p| p.invoice_id == Some(invoice_id))
                        .map(|p| p.amount)
                        .sum();
                    invoice
                        .reconcile(paid + payment.amount, payment.payment_date)
                        .map_err(|err| PortError::conflict(err.to_string()))?;
                    Some(invoice)
                }
                None => None,
            };

            if let Some(invoice) = &invoice {
                invoices.insert(invoice.id, invoice.clone());
            }
            if let Some(c) = commission {
                self.commissions.write().await.insert(c.id, c);
            }
            self.payments.write().await.insert(payment.id, payment.clone());
            Ok(RecordedPayment { payment, invoice })
        }

        async fn payments_total_for_invoice(
            &self,
            ctx: &TenantContext,
            invoice_id: InvoiceId,
        ) -> Result<Decimal, PortError> {
            let scope = ctx.read_scope()?;
            Ok(self
                .payments
                .read()
                .await
                .values()
                .filter(|p| scope.allows(p.company_id) && p.invoice_id == Some(invoice_id))
                .map(|p| p.amount)
                .sum())
        }

        async fn list_payments(
            &self,
            ctx: &TenantContext,
            customer_id: Option<CustomerId>,
        ) -> Result<Vec<Payment>, PortError> {
            let scope = ctx.read_scope()?;
            let mut result: Vec<_> = self
                .payments
                .read()
                .await
                .values()
                .filter(|p| scope.allows(p.company_id) && customer_id.map_or(true, |c| p.customer_id == c))
                .cloned()
                .collect();
            result.sort_by_key(|p| p.payment_date);
            Ok(result)
        }

        async fn get_reseller_profile(
            &self,
            ctx: &TenantContext,
            user_id: UserId,
        ) -> Result<Option<ResellerProfile>, PortError> {
            let scope = ctx.read_scope()?;
            Ok(self
                .profiles
                .read()
                .await
                .get(&user_id)
                .filter(|p| scope.allows(p.company_id))
                .cloned())
        }

        async fn save_reseller_profile(&self, ctx: &TenantContext, profile: &ResellerProfile) -> Result<(), PortError> {
            let mut profiles = self.profiles.write().await;
            let mut stored = profile.clone();
            stored.company_id = match profiles.get(&profile.user_id) {
                Some(existing) => {
                    ctx.authorize_write(existing.company_id)?;
                    existing.company_id
                }
                None => ctx.stamp(profile.company_id)?,
            };
            profiles.insert(stored.user_id, stored);
            Ok(())
        }

        async fn insert_commission(
            &self,
            ctx: &TenantContext,
            commission: &ResellerCommission,
        ) -> Result<ResellerCommission, PortError> {
            let mut stored = commission.clone();
            stored.company_id = ctx.stamp(commission.company_id)?;
            self.commissions.write().await.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn list_commissions(
            &self,
            ctx: &TenantContext,
            reseller_id: Option<UserId>,
            status: Option<CommissionStatus>,
        ) -> Result<Vec<ResellerCommission>, PortError> {
            let scope = ctx.read_scope()?;
            let mut result: Vec<_> = self
                .commissions
                .read()
                .await
                .values()
                .filter(|c| {
                    scope.allows(c.company_id)
                        && reseller_id.map_or(true, |r| c.reseller_id == r)
                        && status.map_or(true, |s| c.status == s)
                })
                .cloned()
                .collect();
            result.sort_by_key(|c| c.created_at);
            Ok(result)
        }
    }
}
