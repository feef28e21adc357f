//! Router connector for deployments without router integration

use std::sync::Arc;

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError, RouterId, TenantContext};

use crate::router::{RouterConnector, RouterControl};

/// Refuses every connection with `ServiceUnavailable`
///
/// Expiry processing treats router failures as best-effort, so billing keeps
/// working and each skipped disable is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRouterConnector;

impl DomainPort for DisabledRouterConnector {}

#[async_trait]
impl RouterConnector for DisabledRouterConnector {
    async fn connect(
        &self,
        _ctx: &TenantContext,
        router_id: RouterId,
    ) -> Result<Arc<dyn RouterControl>, PortError> {
        Err(PortError::ServiceUnavailable {
            service: format!("router integration disabled ({})", router_id),
        })
    }
}
