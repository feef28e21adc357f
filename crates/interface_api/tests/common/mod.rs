//! Router over the in-memory platform, plus request helpers

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};

use domain_integrations::gateway::mock::MockGateway;
use domain_integrations::{AuditedGateway, GatewayRegistry};
use domain_reseller::Principal;
use domain_tenancy::Company;
use interface_api::auth::create_token;
use interface_api::config::ApiConfig;
use interface_api::{create_router, AppState, Ports};
use test_utils::{MockPlatform, TENANCY};

pub const SECRET: &str = "api-test-secret";

pub struct TestApp {
    pub server: TestServer,
    pub platform: MockPlatform,
    pub state: AppState,
}

pub async fn spawn(companies: Vec<Company>) -> TestApp {
    let platform = MockPlatform::new(companies).await;
    let ports = Ports {
        companies: platform.companies.clone(),
        billing: platform.billing.clone(),
        ledger: platform.ledger.clone(),
        bulk: platform.bulk.clone(),
        sms_store: platform.sms_store.clone(),
        sms_sender: platform.sms_sender.clone(),
        gateway_audit: platform.gateway_audit.clone(),
        tickets: platform.tickets.clone(),
        routers: platform.routers.clone(),
        clock: platform.clock.clone(),
    };
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        tenancy: TENANCY.clone(),
        ..ApiConfig::default()
    };
    let gateways = GatewayRegistry::new().register(AuditedGateway::new(
        Arc::new(MockGateway::new("bkash")),
        platform.gateway_audit.clone(),
    ));

    let state = AppState::new(config, ports, gateways);
    let server = TestServer::new(create_router(state.clone())).unwrap();
    TestApp {
        server,
        platform,
        state,
    }
}

/// Adds the host and bearer headers of a request made by `principal` at `host`
pub trait AsUser {
    fn at(self, host: &str) -> Self;
    fn by(self, principal: &Principal) -> Self;
}

impl AsUser for TestRequest {
    fn at(self, host: &str) -> Self {
        self.add_header(header::HOST, HeaderValue::from_str(host).unwrap())
    }

    fn by(self, principal: &Principal) -> Self {
        let token = create_token(principal, SECRET, 300).unwrap();
        self.add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }
}
