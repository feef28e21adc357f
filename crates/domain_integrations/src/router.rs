//! Router control surface
//!
//! One `RouterControl` per MikroTik device. `RouterConnector` hands out the
//! control for a customer's `router_id` within the caller's tenant.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError, RouterId, TenantContext};

/// An active PPPoE session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PppSession {
    pub username: String,
    pub address: Option<String>,
    pub caller_id: Option<String>,
    pub uptime: Option<String>,
}

/// A PPP profile (speed plan) configured on a router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PppProfile {
    pub name: String,
    pub rate_limit: Option<String>,
}

/// Control surface of a single router
///
/// Boolean results report whether the router accepted the command; transport
/// failures are `PortError`s.
#[async_trait]
pub trait RouterControl: DomainPort {
    async fn disable_pppoe_user(&self, username: &str) -> Result<bool, PortError>;

    async fn enable_pppoe_user(&self, username: &str) -> Result<bool, PortError>;

    async fn create_pppoe_user(
        &self,
        username: &str,
        password: &str,
        profile: &str,
    ) -> Result<bool, PortError>;

    async fn active_sessions(&self) -> Result<Vec<PppSession>, PortError>;

    async fn profiles(&self) -> Result<Vec<PppProfile>, PortError>;
}

/// Resolves a router id to its control surface
#[async_trait]
pub trait RouterConnector: DomainPort {
    async fn connect(
        &self,
        ctx: &TenantContext,
        router_id: RouterId,
    ) -> Result<Arc<dyn RouterControl>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    /// Records every command; can be switched to fail with a transport error
    #[derive(Debug, Default)]
    pub struct MockRouter {
        pub commands: RwLock<Vec<String>>,
        failing: AtomicBool,
    }

    impl MockRouter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub async fn commands(&self) -> Vec<String> {
            self.commands.read().await.clone()
        }

        async fn record(&self, command: String) -> Result<bool, PortError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PortError::Timeout {
                    operation: command,
                    duration_ms: 5000,
                });
            }
            self.commands.write().await.push(command);
            Ok(true)
        }
    }

    impl DomainPort for MockRouter {}

    #[async_trait]
    impl RouterControl for MockRouter {
        async fn disable_pppoe_user(&self, username: &str) -> Result<bool, PortError> {
            self.record(format!("disable {}", username)).await
        }

        async fn enable_pppoe_user(&self, username: &str) -> Result<bool, PortError> {
            self.record(format!("enable {}", username)).await
        }

        async fn create_pppoe_user(
            &self,
            username: &str,
            _password: &str,
            profile: &str,
        ) -> Result<bool, PortError> {
            self.record(format!("create {} {}", username, profile)).await
        }

        async fn active_sessions(&self) -> Result<Vec<PppSession>, PortError> {
            Ok(Vec::new())
        }

        async fn profiles(&self) -> Result<Vec<PppProfile>, PortError> {
            Ok(vec![PppProfile {
                name: "default".to_string(),
                rate_limit: None,
            }])
        }
    }

    /// Connects every router id to the same shared `MockRouter`
    #[derive(Debug, Clone, Default)]
    pub struct MockRouterConnector {
        pub router: Arc<MockRouter>,
    }

    impl MockRouterConnector {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DomainPort for MockRouterConnector {}

    #[async_trait]
    impl RouterConnector for MockRouterConnector {
        async fn connect(
            &self,
            ctx: &TenantContext,
            _router_id: RouterId,
        ) -> Result<Arc<dyn RouterControl>, PortError> {
            ctx.read_scope()?;
            Ok(self.router.clone())
        }
    }
}
