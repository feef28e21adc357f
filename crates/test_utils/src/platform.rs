//! In-memory platform
//!
//! Every port backed by its mock, with billing, ledger and bulk sharing one
//! set of customer and commission tables, and a `FixedClock` at
//! [`TemporalFixtures::today`]. Services built from it behave like the
//! PostgreSQL-backed ones, minus the database.

use std::sync::Arc;

use core_kernel::FixedClock;
use domain_billing::{BillingEngine, Customer, CustomerService, MockBillingStore, NotificationService, Package};
use domain_bulk::{BulkService, MockBulkStore};
use domain_integrations::gateway::mock::MockGatewayAuditStore;
use domain_integrations::router::mock::MockRouterConnector;
use domain_integrations::sms::mock::{MockSmsSender, MockSmsStore};
use domain_integrations::SmsDispatcher;
use domain_reseller::{LedgerService, MockLedgerStore, RechargeService};
use domain_support::{MockTicketStore, SupportService};
use domain_tenancy::{Company, CompanyService, MockCompanyDirectory, TenantResolver};

use crate::fixtures::{TemporalFixtures, TENANCY};

/// Mock adapters for every port
pub struct MockPlatform {
    pub companies: Arc<MockCompanyDirectory>,
    pub billing: Arc<MockBillingStore>,
    pub ledger: Arc<MockLedgerStore>,
    pub bulk: Arc<MockBulkStore>,
    pub sms_store: Arc<MockSmsStore>,
    pub sms_sender: Arc<MockSmsSender>,
    pub gateway_audit: Arc<MockGatewayAuditStore>,
    pub tickets: Arc<MockTicketStore>,
    pub routers: Arc<MockRouterConnector>,
    pub clock: Arc<FixedClock>,
}

impl MockPlatform {
    pub async fn new(companies: Vec<Company>) -> Self {
        let billing = MockBillingStore::new();
        let ledger = MockLedgerStore::with_billing(&billing);
        let bulk = MockBulkStore::new(&billing);

        Self {
            companies: Arc::new(MockCompanyDirectory::with_companies(companies).await),
            billing: Arc::new(billing),
            ledger: Arc::new(ledger),
            bulk: Arc::new(bulk),
            sms_store: Arc::new(MockSmsStore::new()),
            sms_sender: Arc::new(MockSmsSender::new()),
            gateway_audit: Arc::new(MockGatewayAuditStore::new()),
            tickets: Arc::new(MockTicketStore::new()),
            routers: Arc::new(MockRouterConnector::new()),
            clock: Arc::new(FixedClock::at_date(TemporalFixtures::today())),
        }
    }

    pub async fn seed_package(&self, package: &Package) {
        self.billing.seed_package(package.clone()).await;
    }

    pub async fn seed_customer(&self, customer: &Customer) {
        self.billing.seed_customer(customer.clone()).await;
    }

    pub fn resolver(&self) -> TenantResolver {
        TenantResolver::new(TENANCY.clone(), self.companies.clone())
    }

    pub fn company_service(&self) -> CompanyService {
        CompanyService::new(self.companies.clone(), TENANCY.company_defaults())
    }

    pub fn customer_service(&self) -> CustomerService {
        CustomerService::new(self.billing.clone(), self.companies.clone(), self.clock.clone())
    }

    pub fn billing_engine(&self) -> BillingEngine {
        BillingEngine::new(
            self.billing.clone(),
            self.companies.clone(),
            self.routers.clone(),
            self.clock.clone(),
        )
    }

    pub fn ledger_service(&self) -> LedgerService {
        LedgerService::new(self.ledger.clone(), self.clock.clone())
    }

    pub fn recharge_service(&self) -> RechargeService {
        RechargeService::new(self.ledger_service(), self.billing_engine())
    }

    pub fn bulk_service(&self) -> BulkService {
        BulkService::new(
            self.bulk.clone(),
            self.customer_service(),
            self.companies.clone(),
            self.clock.clone(),
        )
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(
            self.billing.clone(),
            self.companies.clone(),
            SmsDispatcher::new(self.sms_sender.clone(), self.sms_store.clone()),
            self.clock.clone(),
        )
    }

    pub fn support_service(&self) -> SupportService {
        SupportService::new(self.tickets.clone(), self.billing.clone(), self.clock.clone())
    }
}
