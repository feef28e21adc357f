//! Application wiring
//!
//! `Ports` bundles one adapter per port. `AppState` builds the domain
//! services over them once at startup and is cloned into every handler and
//! job. The server and job binaries wire PostgreSQL adapters with
//! [`Ports::postgres`]; tests wire the in-memory mocks.

use std::sync::Arc;

use core_kernel::{Clock, HealthCheckResult, HealthCheckable, SystemClock};
use domain_billing::{BillingEngine, BillingStore, CustomerService, NotificationService};
use domain_bulk::{BulkService, BulkStore};
use domain_integrations::{
    DisabledRouterConnector, DisabledSmsSender, GatewayAuditStore, GatewayRegistry, HttpSmsSender,
    RouterConnector, SmsDispatcher, SmsSender, SmsStore,
};
use domain_reseller::{LedgerService, LedgerStore, RechargeService};
use domain_support::{SupportService, TicketStore};
use domain_tenancy::{CompanyDirectory, CompanyService, TenantResolver};
use infra_db::{
    DatabasePool, PostgresBillingStore, PostgresBulkStore, PostgresCompanyDirectory, PostgresGatewayAuditStore,
    PostgresLedgerStore, PostgresSmsStore, PostgresTicketStore,
};

use crate::config::ApiConfig;

/// One adapter per port
#[derive(Clone)]
pub struct Ports {
    pub companies: Arc<dyn CompanyDirectory>,
    pub billing: Arc<dyn BillingStore>,
    pub ledger: Arc<dyn LedgerStore>,
    pub bulk: Arc<dyn BulkStore>,
    pub sms_store: Arc<dyn SmsStore>,
    pub sms_sender: Arc<dyn SmsSender>,
    pub gateway_audit: Arc<dyn GatewayAuditStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub routers: Arc<dyn RouterConnector>,
    pub clock: Arc<dyn Clock>,
}

impl Ports {
    /// PostgreSQL adapters over one pool
    ///
    /// Router integration is off until a router connector is configured, and
    /// SMS goes through the HTTP gateway when `config.sms` is set.
    pub fn postgres(pool: DatabasePool, config: &ApiConfig) -> anyhow::Result<Self> {
        let sms_sender: Arc<dyn SmsSender> = match &config.sms {
            Some(sms) => Arc::new(HttpSmsSender::new(sms.clone())?),
            None => {
                tracing::warn!("no SMS gateway configured; messages will be logged as failed");
                Arc::new(DisabledSmsSender)
            }
        };

        Ok(Self {
            companies: Arc::new(PostgresCompanyDirectory::new(pool.clone())),
            billing: Arc::new(PostgresBillingStore::new(pool.clone())),
            ledger: Arc::new(PostgresLedgerStore::new(pool.clone())),
            bulk: Arc::new(PostgresBulkStore::new(pool.clone())),
            sms_store: Arc::new(PostgresSmsStore::new(pool.clone())),
            sms_sender,
            gateway_audit: Arc::new(PostgresGatewayAuditStore::new(pool.clone())),
            tickets: Arc::new(PostgresTicketStore::new(pool)),
            routers: Arc::new(DisabledRouterConnector),
            clock: Arc::new(SystemClock),
        })
    }
}

/// Application state shared across handlers and jobs
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub resolver: TenantResolver,
    pub companies: CompanyService,
    pub customers: CustomerService,
    pub billing: BillingEngine,
    pub ledger: LedgerService,
    pub recharge: RechargeService,
    pub bulk: BulkService,
    pub notifications: NotificationService,
    pub support: SupportService,
    pub gateways: GatewayRegistry,
    pub gateway_audit: Arc<dyn GatewayAuditStore>,
    ports: Ports,
}

impl AppState {
    pub fn new(config: ApiConfig, ports: Ports, gateways: GatewayRegistry) -> Self {
        let resolver = TenantResolver::new(config.tenancy.clone(), ports.companies.clone());
        let companies = CompanyService::new(ports.companies.clone(), config.tenancy.company_defaults());
        let customers = CustomerService::new(ports.billing.clone(), ports.companies.clone(), ports.clock.clone());
        let billing = BillingEngine::new(
            ports.billing.clone(),
            ports.companies.clone(),
            ports.routers.clone(),
            ports.clock.clone(),
        );
        let ledger = LedgerService::new(ports.ledger.clone(), ports.clock.clone());
        let recharge = RechargeService::new(ledger.clone(), billing.clone());
        let bulk = BulkService::new(ports.bulk.clone(), customers.clone(), ports.companies.clone(), ports.clock.clone())
            .with_chunk_size(config.bulk_chunk_size);
        let notifications = NotificationService::new(
            ports.billing.clone(),
            ports.companies.clone(),
            SmsDispatcher::new(ports.sms_sender.clone(), ports.sms_store.clone()),
            ports.clock.clone(),
        );
        let support = SupportService::new(ports.tickets.clone(), ports.billing.clone(), ports.clock.clone());

        Self {
            config: Arc::new(config),
            resolver,
            companies,
            customers,
            billing,
            ledger,
            recharge,
            bulk,
            notifications,
            support,
            gateways,
            gateway_audit: ports.gateway_audit.clone(),
            ports,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.ports.clock
    }

    /// Health of every storage adapter
    pub async fn health(&self) -> Vec<HealthCheckResult> {
        vec![
            self.ports.billing.health_check().await,
            self.ports.ledger.health_check().await,
            self.ports.bulk.health_check().await,
            self.ports.tickets.health_check().await,
        ]
    }
}
