//! Billing engine
//!
//! Orchestrates invoice generation, payment recording, commission accrual
//! and the expiry lifecycle. Every call runs under an explicit
//! `TenantContext`; "today" is always the calendar date in the owning
//! company's timezone.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use core_kernel::{add_days, ensure_positive, Clock, CompanyId, CustomerId, PaymentId, TenantContext};
use domain_integrations::{AuditedGateway, GatewayPaymentRequest, GatewayResponse, RouterConnector};
use domain_tenancy::{Company, CompanyDirectory};

use crate::commission::ResellerCommission;
use crate::customer::{Customer, CustomerQuery, CustomerStatus};
use crate::error::BillingError;
use crate::expiry::{is_past, next_expiry, ExpiryOutcome, PaymentType};
use crate::invoice::{Invoice, InvoiceNumber, DUE_AFTER_DAYS};
use crate::package::InvoicePricing;
use crate::payment::{NewPayment, Payment, PaymentMethod};
use crate::ports::{BillingStore, PaymentRecord};

/// Result of recording one payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    /// The referenced invoice after reconciliation
    pub invoice: Option<Invoice>,
    pub commission: Option<ResellerCommission>,
}

/// Counts from one company's expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpirationSummary {
    pub examined: usize,
    pub expired: usize,
    pub router_disabled: usize,
}

#[derive(Clone)]
pub struct BillingEngine {
    store: Arc<dyn BillingStore>,
    companies: Arc<dyn CompanyDirectory>,
    routers: Arc<dyn RouterConnector>,
    clock: Arc<dyn Clock>,
}

impl BillingEngine {
    pub fn new(
        store: Arc<dyn BillingStore>,
        companies: Arc<dyn CompanyDirectory>,
        routers: Arc<dyn RouterConnector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            companies,
            routers,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<dyn BillingStore> {
        &self.store
    }

    /// Loads a company the context may act on, with its local date
    async fn company_today(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<(Company, NaiveDate), BillingError> {
        ctx.authorize_write(company_id)?;
        let company = self.companies.get_company(company_id).await?;
        let today = self.clock.today_in(company.timezone);
        Ok((company, today))
    }

    // ------------------------------------------------------------------
    // Invoices
    // ------------------------------------------------------------------

    /// Generates this cycle's invoice for every active customer of a company
    ///
    /// Free customers and customers without a package are skipped. A
    /// customer whose invoice fails is logged and the sweep continues.
    ///
    /// # Returns
    ///
    /// The number of invoices actually created
    pub async fn generate_invoices_for_company(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<usize, BillingError> {
        let (company, today) = self.company_today(ctx, company_id).await?;
        let customers = self
            .store
            .list_customers(ctx, &CustomerQuery::active_in(company_id))
            .await?;

        let mut created = 0;
        for customer in &customers {
            match self.invoice_customer(ctx, &company, customer, today).await {
                Ok(Some(_)) => created += 1,
                Ok(None) => {}
                Err(err) => error!(
                    company_id = %company_id,
                    customer_id = %customer.id,
                    error = %err,
                    "invoice generation failed"
                ),
            }
        }

        info!(company_id = %company_id, customers = customers.len(), created, "invoices generated");
        Ok(created)
    }

    /// Generates this cycle's invoice for one customer
    ///
    /// Returns `None` (no error) for free customers and customers without a
    /// package.
    pub async fn generate_invoice_for_customer(
        &self,
        ctx: &TenantContext,
        customer_id: CustomerId,
    ) -> Result<Option<Invoice>, BillingError> {
        let customer = self.store.get_customer(ctx, customer_id).await?;
        let (company, today) = self.company_today(ctx, customer.company_id).await?;
        self.invoice_customer(ctx, &company, &customer, today).await
    }

    async fn invoice_customer(
        &self,
        ctx: &TenantContext,
        company: &Company,
        customer: &Customer,
        billing_date: NaiveDate,
    ) -> Result<Option<Invoice>, BillingError> {
        if customer.is_free() {
            debug!(customer_id = %customer.id, "free customer, no invoice");
            return Ok(None);
        }
        let Some(package_id) = customer.package_id else {
            debug!(customer_id = %customer.id, "no package, no invoice");
            return Ok(None);
        };

        let package = self.store.get_package(ctx, package_id).await?;
        let pricing = InvoicePricing::for_package(&package, Some(company.vat_percent))?;
        let due_date = add_days(billing_date, DUE_AFTER_DAYS)?;

        let sequence = self
            .store
            .allocate_invoice_sequence(ctx, customer.company_id, billing_date)
            .await?;
        let invoice = Invoice::issue(
            customer.company_id,
            customer.id,
            InvoiceNumber::format(billing_date, sequence),
            billing_date,
            due_date,
            pricing,
        );
        let stored = self.store.insert_invoice(ctx, &invoice).await?;

        debug!(
            customer_id = %customer.id,
            invoice_number = %stored.invoice_number,
            total = %stored.total_amount,
            "invoice issued"
        );
        Ok(Some(stored))
    }

    /// Price of one billing cycle for a customer's current package
    pub async fn cycle_price(
        &self,
        ctx: &TenantContext,
        customer: &Customer,
    ) -> Result<InvoicePricing, BillingError> {
        let package_id = customer.package_id.ok_or_else(|| {
            BillingError::Validation(format!("customer {} has no package", customer.username))
        })?;
        let package = self.store.get_package(ctx, package_id).await?;
        let company = self.companies.get_company(customer.company_id).await?;
        Ok(InvoicePricing::for_package(&package, Some(company.vat_percent))?)
    }

    // ------------------------------------------------------------------
    // Payments and commissions
    // ------------------------------------------------------------------

    /// Validates a payment and builds the writes that record it
    ///
    /// Nothing is written. The invoice check here fails fast; the store
    /// repeats it under the invoice's row lock.
    ///
    /// # Errors
    ///
    /// * `InvalidAmount` - the amount is not positive
    /// * `InvoiceClosed` - the invoice is already paid or cancelled
    /// * `Validation` - the invoice belongs to another customer
    pub async fn prepare_payment(
        &self,
        ctx: &TenantContext,
        mut request: NewPayment,
    ) -> Result<PaymentRecord, BillingError> {
        request.amount = ensure_positive(request.amount)?;
        let customer = self.store.get_customer(ctx, request.customer_id).await?;

        if let Some(invoice_id) = request.invoice_id {
            let invoice = self.store.get_invoice(ctx, invoice_id).await?;
            if invoice.customer_id != customer.id {
                return Err(BillingError::Validation(format!(
                    "invoice {} does not belong to customer {}",
                    invoice.invoice_number, customer.id
                )));
            }
            invoice.ensure_open()?;
        }

        let payment = Payment::record(customer.company_id, request, self.clock.now());
        let commission = self.commission_for(ctx, &customer, Some(payment.id)).await?;
        Ok(PaymentRecord { payment, commission })
    }

    /// Records a payment
    ///
    /// Stamps `payment_date` with the current instant. A referenced
    /// invoice is reconciled against the sum of its payments, and a
    /// customer managed by a reseller accrues a commission off the package
    /// price. Payment, invoice update and commission are written together.
    ///
    /// # Errors
    ///
    /// As [`BillingEngine::prepare_payment`], plus `Port(Conflict)` when
    /// the invoice closed between the check and the write.
    pub async fn process_payment(
        &self,
        ctx: &TenantContext,
        request: NewPayment,
    ) -> Result<PaymentOutcome, BillingError> {
        let record = self.prepare_payment(ctx, request).await?;
        let recorded = self.store.record_payment(ctx, &record).await?;
        let payment = recorded.payment;

        info!(
            company_id = %payment.company_id,
            customer_id = %payment.customer_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            method = payment.payment_method.as_str(),
            invoice_status = ?recorded.invoice.as_ref().map(|i| i.status),
            commission = record.commission.is_some(),
            "payment recorded"
        );

        Ok(PaymentOutcome {
            payment,
            invoice: recorded.invoice,
            commission: record.commission,
        })
    }

    /// Builds the commission owed for a payment, if any
    ///
    /// `None` when the customer has no reseller, the reseller has no rate,
    /// or the customer has no package.
    async fn commission_for(
        &self,
        ctx: &TenantContext,
        customer: &Customer,
        payment_id: Option<PaymentId>,
    ) -> Result<Option<ResellerCommission>, BillingError> {
        let Some(reseller_id) = customer.reseller_id else {
            return Ok(None);
        };
        let Some(percent) = self
            .store
            .get_reseller_profile(ctx, reseller_id)
            .await?
            .and_then(|p| p.commission_percent)
        else {
            return Ok(None);
        };
        let Some(package_id) = customer.package_id else {
            return Ok(None);
        };

        let package = self.store.get_package(ctx, package_id).await?;
        let commission = ResellerCommission::accrue(
            customer.company_id,
            reseller_id,
            customer.id,
            payment_id,
            package.price,
            percent,
        )?;
        Ok(Some(commission))
    }

    /// Accrues and stores a commission for a payment of `paid_amount`
    ///
    /// The commission base is always the package price, not the amount
    /// paid.
    pub async fn calculate_and_record_commission(
        &self,
        ctx: &TenantContext,
        customer_id: CustomerId,
        paid_amount: Decimal,
    ) -> Result<Option<ResellerCommission>, BillingError> {
        let customer = self.store.get_customer(ctx, customer_id).await?;
        let Some(commission) = self.commission_for(ctx, &customer, None).await? else {
            debug!(customer_id = %customer_id, "no commission applicable");
            return Ok(None);
        };

        let stored = self.store.insert_commission(ctx, &commission).await?;
        info!(
            reseller_id = %stored.reseller_id,
            customer_id = %customer_id,
            paid_amount = %paid_amount,
            commission = %stored.commission_amount,
            percent = %stored.commission_percent,
            "commission accrued"
        );
        Ok(Some(stored))
    }

    // ------------------------------------------------------------------
    // Expiry lifecycle
    // ------------------------------------------------------------------

    /// The expiry one paid cycle gives `customer`, as of the company's today
    ///
    /// A lapsed (or missing) expiry restarts from today; a running one is
    /// extended from its current end.
    pub async fn next_expiry_for(&self, ctx: &TenantContext, customer: &Customer) -> Result<NaiveDate, BillingError> {
        let (_, today) = self.company_today(ctx, customer.company_id).await?;
        Ok(next_expiry(customer.expiry_date, today)?)
    }

    /// Extends a customer's service by one calendar month
    ///
    /// Only `expiry_date` is changed.
    pub async fn extend_customer_expiry(
        &self,
        ctx: &TenantContext,
        customer_id: CustomerId,
        payment_type: PaymentType,
    ) -> Result<NaiveDate, BillingError> {
        let mut customer = self.store.get_customer(ctx, customer_id).await?;
        let new_expiry = self.next_expiry_for(ctx, &customer).await?;

        let previous = customer.expiry_date;
        customer.expiry_date = Some(new_expiry);
        customer.touch();
        self.store.update_customer(ctx, &customer).await?;

        info!(
            customer_id = %customer_id,
            payment_type = payment_type.as_str(),
            previous = ?previous,
            expiry = %new_expiry,
            "expiry extended"
        );
        Ok(new_expiry)
    }

    /// Applies the expiry rules to one customer
    pub async fn process_customer_expiry(
        &self,
        ctx: &TenantContext,
        customer_id: CustomerId,
    ) -> Result<ExpiryOutcome, BillingError> {
        let customer = self.store.get_customer(ctx, customer_id).await?;
        let (_, today) = self.company_today(ctx, customer.company_id).await?;
        self.expire_customer(ctx, customer, today).await
    }

    async fn expire_customer(
        &self,
        ctx: &TenantContext,
        mut customer: Customer,
        today: NaiveDate,
    ) -> Result<ExpiryOutcome, BillingError> {
        if customer.is_free() {
            return Ok(ExpiryOutcome::SkippedFree);
        }
        if !is_past(customer.expiry_date, today) {
            return Ok(ExpiryOutcome::NotExpired);
        }
        if customer.is_vip() {
            return Ok(ExpiryOutcome::SkippedVip);
        }
        if !self.store.has_unpaid_invoices(ctx, customer.id).await? {
            return Ok(ExpiryOutcome::NoUnpaidInvoices);
        }

        let expired_package = self
            .store
            .find_expired_package(ctx, customer.company_id)
            .await?;
        let package_changed = match expired_package {
            Some(package) if customer.package_id != Some(package.id) => {
                customer.package_id = Some(package.id);
                true
            }
            _ => false,
        };
        customer.status = CustomerStatus::Expired;
        customer.touch();
        self.store.update_customer(ctx, &customer).await?;

        let router_disabled = self.disable_on_router(ctx, &customer).await;

        info!(
            customer_id = %customer.id,
            username = %customer.username,
            package_changed,
            router_disabled,
            "customer expired"
        );
        Ok(ExpiryOutcome::Expired {
            package_changed,
            router_disabled,
        })
    }

    /// Best-effort PPPoE disable; failures are logged and never undo the expiry
    async fn disable_on_router(&self, ctx: &TenantContext, customer: &Customer) -> bool {
        let Some(router_id) = customer.router_id else {
            return false;
        };
        let router = match self.routers.connect(ctx, router_id).await {
            Ok(router) => router,
            Err(err) => {
                warn!(customer_id = %customer.id, router_id = %router_id, error = %err, "router unavailable");
                return false;
            }
        };
        match router.disable_pppoe_user(&customer.username).await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(customer_id = %customer.id, router_id = %router_id, error = %err, "router disable failed");
                false
            }
        }
    }

    /// Expires every active customer of a company whose service has lapsed
    pub async fn process_expirations_for_company(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<ExpirationSummary, BillingError> {
        let (_, today) = self.company_today(ctx, company_id).await?;
        let query = CustomerQuery {
            expired_before: Some(today),
            ..CustomerQuery::active_in(company_id)
        };
        let customers = self.store.list_customers(ctx, &query).await?;

        let mut summary = ExpirationSummary {
            examined: customers.len(),
            ..Default::default()
        };
        for customer in customers {
            let customer_id = customer.id;
            match self.expire_customer(ctx, customer, today).await {
                Ok(ExpiryOutcome::Expired { router_disabled, .. }) => {
                    summary.expired += 1;
                    if router_disabled {
                        summary.router_disabled += 1;
                    }
                }
                Ok(_) => {}
                Err(err) => error!(customer_id = %customer_id, error = %err, "expiry processing failed"),
            }
        }

        info!(
            company_id = %company_id,
            examined = summary.examined,
            expired = summary.expired,
            "expirations processed"
        );
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Gateway payments
    // ------------------------------------------------------------------

    /// Records an `online` payment confirmed by a gateway
    ///
    /// The gateway's customer reference is the customer's username.
    pub async fn record_gateway_payment(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        gateway: &str,
        request: &GatewayPaymentRequest,
    ) -> Result<PaymentOutcome, BillingError> {
        let customer = self
            .store
            .find_customer_by_username(ctx, company_id, &request.customer_ref)
            .await?
            .ok_or_else(|| BillingError::CustomerNotFound(request.customer_ref.clone()))?;

        let payment = NewPayment::new(customer.id, request.amount, PaymentMethod::Online)
            .via_gateway(gateway, request.trx_id.clone());
        self.process_payment(ctx, payment).await
    }

    /// Pushes a payment through an audited gateway and records it on success
    ///
    /// The gateway call is audited regardless of outcome. A rejected
    /// payment returns the gateway's answer with no payment recorded.
    pub async fn collect_gateway_payment(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        gateway: &AuditedGateway,
        request: &GatewayPaymentRequest,
    ) -> Result<(GatewayResponse, Option<PaymentOutcome>), BillingError> {
        let response = gateway.process_payment(ctx, company_id, request).await?;
        if !response.success {
            info!(gateway = gateway.name(), trx_id = %request.trx_id, "gateway rejected payment");
            return Ok((response, None));
        }
        let outcome = self
            .record_gateway_payment(ctx, company_id, gateway.name(), request)
            .await?;
        Ok((response, Some(outcome)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use core_kernel::{FixedClock, PackageId, PortError, RouterId, UserId};
    use domain_integrations::gateway::mock::{MockGateway, MockGatewayAuditStore};
    use domain_integrations::router::mock::MockRouterConnector;
    use domain_tenancy::{MockCompanyDirectory, NewCompany, TenancyConfig};
    use rust_decimal_macros::dec;

    use crate::commission::ResellerProfile;
    use crate::customer::{CustomerType, NewCustomer};
    use crate::invoice::{InvoiceQuery, InvoiceStatus};
    use crate::package::{NewPackage, Package};
    use crate::ports::mock::MockBillingStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        engine: BillingEngine,
        store: MockBillingStore,
        routers: MockRouterConnector,
        company: Company,
        ctx: TenantContext,
    }

    async fn fixture(today: NaiveDate) -> Fixture {
        let mut company = Company::from_request(
            NewCompany {
                name: "Alpha Net".to_string(),
                subdomain: Some("alpha".to_string()),
                ..Default::default()
            },
            &TenancyConfig::default().company_defaults(),
        );
        company.vat_percent = dec!(5);
        let directory = MockCompanyDirectory::with_companies(vec![company.clone()]).await;
        let store = MockBillingStore::new();
        let routers = MockRouterConnector::new();
        let engine = BillingEngine::new(
            Arc::new(store.clone()),
            Arc::new(directory),
            Arc::new(routers.clone()),
            Arc::new(FixedClock::at_date(today)),
        );
        Fixture {
            engine,
            store,
            routers,
            ctx: TenantContext::tenant(company.id),
            company,
        }
    }

    async fn package(f: &Fixture, price: Decimal, vat: Option<Decimal>, expired: bool) -> Package {
        let package = Package::from_request(
            f.company.id,
            NewPackage {
                name: if expired { "Expired".into() } else { "Home 10M".into() },
                price,
                vat_percent: vat,
                is_expired_package: expired,
                ..Default::default()
            },
        );
        f.store.seed_package(package.clone()).await;
        package
    }

    async fn customer(f: &Fixture, username: &str, package_id: Option<PackageId>) -> Customer {
        let customer = Customer::from_request(
            f.company.id,
            NewCustomer {
                name: username.to_string(),
                phone: "01700000000".to_string(),
                username: username.to_string(),
                password: "secret1".to_string(),
                package_id,
                ..Default::default()
            },
            date(2025, 1, 1),
        );
        f.store.seed_customer(customer.clone()).await;
        customer
    }

    async fn set_customer(f: &Fixture, customer: &Customer) {
        f.store.seed_customer(customer.clone()).await;
    }

    #[tokio::test]
    async fn test_invoice_vat_and_numbering() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(100.00), Some(dec!(15)), false).await;
        let c1 = customer(&f, "one", Some(pkg.id)).await;

        let invoice = f
            .engine
            .generate_invoice_for_customer(&f.ctx, c1.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.vat_amount, dec!(15.00));
        assert_eq!(invoice.total_amount, dec!(115.00));
        assert_eq!(invoice.invoice_number, "INV-20250310-0001");
        assert_eq!(invoice.due_date, date(2025, 3, 25));
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);

        let second = f
            .engine
            .generate_invoice_for_customer(&f.ctx, c1.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.invoice_number, "INV-20250310-0002");
    }

    #[tokio::test]
    async fn test_company_vat_fallback() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(100.00), None, false).await;
        let c = customer(&f, "one", Some(pkg.id)).await;

        let invoice = f.engine.generate_invoice_for_customer(&f.ctx, c.id).await.unwrap().unwrap();
        assert_eq!(invoice.vat_amount, dec!(5.00));
        assert_eq!(invoice.total_amount, dec!(105.00));
    }

    #[tokio::test]
    async fn test_free_and_packageless_customers_skipped() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(500.00), None, false).await;
        let mut free = customer(&f, "free", Some(pkg.id)).await;
        free.customer_type = CustomerType::Free;
        set_customer(&f, &free).await;
        let bare = customer(&f, "bare", None).await;

        for _ in 0..2 {
            assert!(f.engine.generate_invoice_for_customer(&f.ctx, free.id).await.unwrap().is_none());
            assert!(f.engine.generate_invoice_for_customer(&f.ctx, bare.id).await.unwrap().is_none());
        }
        let created = f.engine.generate_invoices_for_company(&f.ctx, f.company.id).await.unwrap();
        assert_eq!(created, 0);
    }

    #[tokio::test]
    async fn test_sweep_only_active_customers() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(500.00), None, false).await;
        customer(&f, "a", Some(pkg.id)).await;
        customer(&f, "b", Some(pkg.id)).await;
        let mut suspended = customer(&f, "c", Some(pkg.id)).await;
        suspended.status = CustomerStatus::Suspended;
        set_customer(&f, &suspended).await;

        let created = f.engine.generate_invoices_for_company(&f.ctx, f.company.id).await.unwrap();
        assert_eq!(created, 2);
    }

    #[tokio::test]
    async fn test_payment_reconciles_invoice() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(1000.00), Some(dec!(0)), false).await;
        let c = customer(&f, "one", Some(pkg.id)).await;
        let invoice = f.engine.generate_invoice_for_customer(&f.ctx, c.id).await.unwrap().unwrap();

        let partial = f
            .engine
            .process_payment(&f.ctx, NewPayment::new(c.id, dec!(400), PaymentMethod::Receive).for_invoice(invoice.id))
            .await
            .unwrap();
        assert_eq!(partial.invoice.unwrap().status, InvoiceStatus::Partial);

        let full = f
            .engine
            .process_payment(&f.ctx, NewPayment::new(c.id, dec!(600), PaymentMethod::Receive).for_invoice(invoice.id))
            .await
            .unwrap();
        let paid = full.invoice.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.payment_date.is_some());

        let err = f
            .engine
            .process_payment(&f.ctx, NewPayment::new(c.id, dec!(1), PaymentMethod::Receive).for_invoice(invoice.id))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::InvoiceClosed { .. }));
        assert_eq!(f.store.list_payments(&f.ctx, Some(c.id)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invoice_reconciled_against_stored_payments() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(1000.00), Some(dec!(0)), false).await;
        let c = customer(&f, "one", Some(pkg.id)).await;
        let invoice = f.engine.generate_invoice_for_customer(&f.ctx, c.id).await.unwrap().unwrap();

        // Both are prepared against the same unpaid view of the invoice
        let first = f
            .engine
            .prepare_payment(&f.ctx, NewPayment::new(c.id, dec!(500), PaymentMethod::Receive).for_invoice(invoice.id))
            .await
            .unwrap();
        let second = f
            .engine
            .prepare_payment(&f.ctx, NewPayment::new(c.id, dec!(500), PaymentMethod::Receive).for_invoice(invoice.id))
            .await
            .unwrap();

        let recorded = f.store.record_payment(&f.ctx, &first).await.unwrap();
        assert_eq!(recorded.invoice.unwrap().status, InvoiceStatus::Partial);
        let recorded = f.store.record_payment(&f.ctx, &second).await.unwrap();
        assert_eq!(recorded.invoice.unwrap().status, InvoiceStatus::Paid);

        let stored = f.store.get_invoice(&f.ctx, invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_concurrent_payments_settle_invoice() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(1000.00), Some(dec!(0)), false).await;
        let c = customer(&f, "one", Some(pkg.id)).await;
        let invoice = f.engine.generate_invoice_for_customer(&f.ctx, c.id).await.unwrap().unwrap();

        let half = || NewPayment::new(c.id, dec!(500), PaymentMethod::Receive).for_invoice(invoice.id);
        let (a, b) = tokio::join!(
            f.engine.process_payment(&f.ctx, half()),
            f.engine.process_payment(&f.ctx, half())
        );
        a.unwrap();
        b.unwrap();

        let stored = f.store.get_invoice(&f.ctx, invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(f.store.payments_total_for_invoice(&f.ctx, invoice.id).await.unwrap(), dec!(1000));
    }

    #[tokio::test]
    async fn test_invoice_closed_after_check_records_nothing() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(1000.00), Some(dec!(0)), false).await;
        let c = customer(&f, "one", Some(pkg.id)).await;
        let invoice = f.engine.generate_invoice_for_customer(&f.ctx, c.id).await.unwrap().unwrap();

        let record = f
            .engine
            .prepare_payment(&f.ctx, NewPayment::new(c.id, dec!(500), PaymentMethod::Receive).for_invoice(invoice.id))
            .await
            .unwrap();
        let mut cancelled = invoice.clone();
        cancelled.status = InvoiceStatus::Cancelled;
        f.store.seed_invoice(cancelled).await;

        let err = f.store.record_payment(&f.ctx, &record).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict { .. }));
        assert!(f.store.list_payments(&f.ctx, Some(c.id)).await.unwrap().is_empty());
        assert_eq!(
            f.store.get_invoice(&f.ctx, invoice.id).await.unwrap().status,
            InvoiceStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_non_positive_payment_rejected() {
        let f = fixture(date(2025, 3, 10)).await;
        let c = customer(&f, "one", None).await;
        let err = f
            .engine
            .process_payment(&f.ctx, NewPayment::new(c.id, dec!(0), PaymentMethod::Receive))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_commission_rate_is_snapshotted() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(1000.00), None, false).await;
        let reseller = UserId::new();
        let mut c = customer(&f, "one", Some(pkg.id)).await;
        c.reseller_id = Some(reseller);
        set_customer(&f, &c).await;

        let mut profile = ResellerProfile {
            user_id: reseller,
            company_id: f.company.id,
            commission_percent: Some(dec!(10)),
        };
        f.store.save_reseller_profile(&f.ctx, &profile).await.unwrap();
        let a = f
            .engine
            .process_payment(&f.ctx, NewPayment::new(c.id, dec!(500), PaymentMethod::Receive))
            .await
            .unwrap();

        profile.commission_percent = Some(dec!(20));
        f.store.save_reseller_profile(&f.ctx, &profile).await.unwrap();
        let b = f
            .engine
            .process_payment(&f.ctx, NewPayment::new(c.id, dec!(500), PaymentMethod::Receive))
            .await
            .unwrap();

        let a = a.commission.unwrap();
        let b = b.commission.unwrap();
        assert_eq!(a.commission_percent, dec!(10));
        assert_eq!(a.commission_amount, dec!(100.00));
        assert_eq!(b.commission_percent, dec!(20));
        assert_eq!(b.commission_amount, dec!(200.00));

        let stored = f.store.list_commissions(&f.ctx, Some(reseller), None).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|c| c.id == a.id && c.commission_percent == dec!(10)));
    }

    #[tokio::test]
    async fn test_no_commission_without_reseller_rate() {
        let f = fixture(date(2025, 3, 10)).await;
        let pkg = package(&f, dec!(1000.00), None, false).await;
        let mut c = customer(&f, "one", Some(pkg.id)).await;
        c.reseller_id = Some(UserId::new());
        set_customer(&f, &c).await;

        let recorded = f
            .engine
            .calculate_and_record_commission(&f.ctx, c.id, dec!(1000))
            .await
            .unwrap();
        assert!(recorded.is_none());
    }

    #[tokio::test]
    async fn test_extend_expiry() {
        let f = fixture(date(2025, 3, 10)).await;
        let mut c = customer(&f, "one", None).await;
        c.expiry_date = Some(date(2025, 1, 31));
        set_customer(&f, &c).await;
        let extended = f
            .engine
            .extend_customer_expiry(&f.ctx, c.id, PaymentType::Receive)
            .await
            .unwrap();
        assert_eq!(extended, date(2025, 4, 10));

        let g = fixture(date(2025, 1, 15)).await;
        let mut c = customer(&g, "two", None).await;
        c.expiry_date = Some(date(2025, 1, 31));
        set_customer(&g, &c).await;
        let extended = g.engine.extend_customer_expiry(&g.ctx, c.id, PaymentType::Due).await.unwrap();
        assert_eq!(extended, date(2025, 2, 28));
        assert_eq!(g.store.raw_customer(c.id).await.unwrap().expiry_date, Some(date(2025, 2, 28)));
    }

    async fn overdue_customer(f: &Fixture, username: &str, kind: CustomerType) -> Customer {
        let pkg = package(f, dec!(800.00), None, false).await;
        let mut c = customer(f, username, Some(pkg.id)).await;
        c.customer_type = kind;
        c.expiry_date = Some(date(2025, 3, 1));
        c.router_id = Some(RouterId::new());
        set_customer(f, &c).await;
        f.engine.generate_invoice_for_customer(&f.ctx, c.id).await.unwrap();
        c
    }

    #[tokio::test]
    async fn test_expiry_moves_to_expired_package_and_disables() {
        let f = fixture(date(2025, 3, 10)).await;
        let expired_pkg = package(&f, dec!(0), None, true).await;
        let c = overdue_customer(&f, "late", CustomerType::Home).await;

        let outcome = f.engine.process_customer_expiry(&f.ctx, c.id).await.unwrap();
        assert_eq!(
            outcome,
            ExpiryOutcome::Expired {
                package_changed: true,
                router_disabled: true
            }
        );
        let stored = f.store.raw_customer(c.id).await.unwrap();
        assert_eq!(stored.status, CustomerStatus::Expired);
        assert_eq!(stored.package_id, Some(expired_pkg.id));
        assert_eq!(f.routers.router.commands().await, vec!["disable late".to_string()]);
    }

    #[tokio::test]
    async fn test_router_failure_does_not_undo_expiry() {
        let f = fixture(date(2025, 3, 10)).await;
        let c = overdue_customer(&f, "late", CustomerType::Home).await;
        f.routers.router.set_failing(true);

        let outcome = f.engine.process_customer_expiry(&f.ctx, c.id).await.unwrap();
        assert_eq!(
            outcome,
            ExpiryOutcome::Expired {
                package_changed: false,
                router_disabled: false
            }
        );
        assert_eq!(f.store.raw_customer(c.id).await.unwrap().status, CustomerStatus::Expired);
    }

    #[tokio::test]
    async fn test_vip_is_never_auto_disabled() {
        let f = fixture(date(2025, 3, 10)).await;
        package(&f, dec!(0), None, true).await;
        let c = overdue_customer(&f, "vip", CustomerType::Vip).await;

        let outcome = f.engine.process_customer_expiry(&f.ctx, c.id).await.unwrap();
        assert_eq!(outcome, ExpiryOutcome::SkippedVip);
        let stored = f.store.raw_customer(c.id).await.unwrap();
        assert_eq!(stored.status, CustomerStatus::Active);
        assert_eq!(stored.package_id, c.package_id);
        assert!(f.routers.router.commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_past_expiry_without_unpaid_invoice_untouched() {
        let f = fixture(date(2025, 3, 10)).await;
        let mut c = customer(&f, "paid-up", None).await;
        c.expiry_date = Some(date(2025, 3, 1));
        set_customer(&f, &c).await;

        let outcome = f.engine.process_customer_expiry(&f.ctx, c.id).await.unwrap();
        assert_eq!(outcome, ExpiryOutcome::NoUnpaidInvoices);
    }

    #[tokio::test]
    async fn test_company_expiration_sweep() {
        let f = fixture(date(2025, 3, 10)).await;
        overdue_customer(&f, "late1", CustomerType::Home).await;
        overdue_customer(&f, "late2", CustomerType::Corporate).await;
        overdue_customer(&f, "vip", CustomerType::Vip).await;
        let mut current = customer(&f, "current", None).await;
        current.expiry_date = Some(date(2025, 4, 1));
        set_customer(&f, &current).await;

        let summary = f
            .engine
            .process_expirations_for_company(&f.ctx, f.company.id)
            .await
            .unwrap();
        assert_eq!(summary.examined, 3);
        assert_eq!(summary.expired, 2);
        assert_eq!(summary.router_disabled, 2);
    }

    #[tokio::test]
    async fn test_gateway_payment_recorded_online() {
        let f = fixture(date(2025, 3, 10)).await;
        let c = customer(&f, "bkash-user", None).await;
        let audit = Arc::new(MockGatewayAuditStore::new());
        let gateway = AuditedGateway::new(Arc::new(MockGateway::new("bkash")), audit.clone());
        let request = GatewayPaymentRequest {
            customer_ref: "bkash-user".to_string(),
            amount: dec!(500),
            mobile_no: "01900000000".to_string(),
            trx_id: "TRX123".to_string(),
            datetime: Utc::now(),
        };

        let (response, outcome) = f
            .engine
            .collect_gateway_payment(&f.ctx, f.company.id, &gateway, &request)
            .await
            .unwrap();
        assert!(response.success);
        let payment = outcome.unwrap().payment;
        assert_eq!(payment.customer_id, c.id);
        assert_eq!(payment.payment_method, PaymentMethod::Online);
        assert_eq!(payment.payment_gateway.as_deref(), Some("bkash"));
        assert_eq!(payment.transaction_id.as_deref(), Some("TRX123"));
        assert_eq!(audit.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cross_tenant_sweep_rejected() {
        let f = fixture(date(2025, 3, 10)).await;
        let other = TenantContext::tenant(CompanyId::new());
        let err = f
            .engine
            .generate_invoices_for_company(&other, f.company.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Tenancy(_)));
        assert!(f
            .store
            .list_invoices(&TenantContext::super_admin(), &InvoiceQuery::default())
            .await
            .unwrap()
            .is_empty());
    }
}
