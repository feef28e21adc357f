//! Payment gateway adapters and their audit trail
//!
//! Gateway wire protocols live in the adapters; the core only sees
//! `GatewayResponse`. Every call made through `AuditedGateway` writes one
//! immutable `GatewayTransactionLog`, including calls that fail in transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{CompanyId, DomainPort, GatewayTransactionId, PortError, TenantContext};

use crate::error::IntegrationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayTransactionType {
    CheckBill,
    Payment,
    Search,
}

impl GatewayTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayTransactionType::CheckBill => "check_bill",
            GatewayTransactionType::Payment => "payment",
            GatewayTransactionType::Search => "search",
        }
    }
}

impl std::str::FromStr for GatewayTransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check_bill" => Ok(GatewayTransactionType::CheckBill),
            "payment" => Ok(GatewayTransactionType::Payment),
            "search" => Ok(GatewayTransactionType::Search),
            other => Err(format!("unknown gateway transaction type: {}", other)),
        }
    }
}

/// A payment pushed by the gateway on behalf of a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPaymentRequest {
    /// Customer reference as known to the gateway (username)
    pub customer_ref: String,
    pub amount: Decimal,
    pub mobile_no: String,
    pub trx_id: String,
    pub datetime: DateTime<Utc>,
}

/// Normalised gateway answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl GatewayResponse {
    pub fn ok(payload: Value) -> Self {
        Self {
            success: true,
            code: None,
            message: None,
            payload,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code.into()),
            message: Some(message.into()),
            payload: Value::Null,
        }
    }
}

/// A mobile-money gateway (bKash, Nagad)
#[async_trait]
pub trait PaymentGateway: DomainPort {
    /// Gateway name recorded on audit rows and payments
    fn name(&self) -> &str;

    async fn check_bill(&self, customer_ref: &str) -> Result<GatewayResponse, PortError>;

    async fn process_payment(&self, request: &GatewayPaymentRequest) -> Result<GatewayResponse, PortError>;

    async fn search_transaction(&self, trx_id: &str) -> Result<GatewayResponse, PortError>;
}

/// Immutable audit row of one gateway call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayTransactionLog {
    pub id: GatewayTransactionId,
    pub company_id: CompanyId,
    pub gateway: String,
    pub transaction_type: GatewayTransactionType,
    pub customer_ref: Option<String>,
    pub trx_id: Option<String>,
    pub amount: Option<Decimal>,
    pub request: Value,
    pub response: Value,
    pub success: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only storage for gateway audit rows
#[async_trait]
pub trait GatewayAuditStore: DomainPort {
    async fn record(&self, ctx: &TenantContext, log: &GatewayTransactionLog) -> Result<(), PortError>;

    async fn list(
        &self,
        ctx: &TenantContext,
        gateway: Option<&str>,
        limit: u32,
    ) -> Result<Vec<GatewayTransactionLog>, PortError>;
}

/// Wraps a gateway so every call is audited
#[derive(Clone)]
pub struct AuditedGateway {
    inner: Arc<dyn PaymentGateway>,
    audit: Arc<dyn GatewayAuditStore>,
}

impl AuditedGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, audit: Arc<dyn GatewayAuditStore>) -> Self {
        Self { inner, audit }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn check_bill(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        customer_ref: &str,
    ) -> Result<GatewayResponse, IntegrationError> {
        let outcome = self.inner.check_bill(customer_ref).await;
        let call = AuditedCall {
            transaction_type: GatewayTransactionType::CheckBill,
            customer_ref: Some(customer_ref.to_string()),
            trx_id: None,
            amount: None,
            request: serde_json::json!({ "customer_ref": customer_ref }),
        };
        self.finish(ctx, company_id, call, outcome).await
    }

    pub async fn process_payment(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        request: &GatewayPaymentRequest,
    ) -> Result<GatewayResponse, IntegrationError> {
        let outcome = self.inner.process_payment(request).await;
        let call = AuditedCall {
            transaction_type: GatewayTransactionType::Payment,
            customer_ref: Some(request.customer_ref.clone()),
            trx_id: Some(request.trx_id.clone()),
            amount: Some(request.amount),
            request: serde_json::to_value(request).unwrap_or(Value::Null),
        };
        self.finish(ctx, company_id, call, outcome).await
    }

    pub async fn search_transaction(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        trx_id: &str,
    ) -> Result<GatewayResponse, IntegrationError> {
        let outcome = self.inner.search_transaction(trx_id).await;
        let call = AuditedCall {
            transaction_type: GatewayTransactionType::Search,
            customer_ref: None,
            trx_id: Some(trx_id.to_string()),
            amount: None,
            request: serde_json::json!({ "trx_id": trx_id }),
        };
        self.finish(ctx, company_id, call, outcome).await
    }

    async fn finish(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        call: AuditedCall,
        outcome: Result<GatewayResponse, PortError>,
    ) -> Result<GatewayResponse, IntegrationError> {
        let (response, success, error) = match &outcome {
            Ok(resp) => (
                serde_json::to_value(resp).unwrap_or(Value::Null),
                resp.success,
                None,
            ),
            Err(err) => (Value::Null, false, Some(err.to_string())),
        };

        let log = GatewayTransactionLog {
            id: GatewayTransactionId::new_v7(),
            company_id,
            gateway: self.inner.name().to_string(),
            transaction_type: call.transaction_type,
            customer_ref: call.customer_ref,
            trx_id: call.trx_id,
            amount: call.amount,
            request: call.request,
            response,
            success,
            error,
            created_at: Utc::now(),
        };

        // Audit write failures do not change the gateway's answer
        if let Err(err) = self.audit.record(ctx, &log).await {
            tracing::error!(
                gateway = %log.gateway,
                transaction_type = log.transaction_type.as_str(),
                error = %err,
                "failed to write gateway audit row"
            );
        }

        if let Err(ref err) = outcome {
            tracing::warn!(gateway = %log.gateway, error = %err, "gateway call failed");
        }
        Ok(outcome?)
    }
}

struct AuditedCall {
    transaction_type: GatewayTransactionType,
    customer_ref: Option<String>,
    trx_id: Option<String>,
    amount: Option<Decimal>,
    request: Value,
}

/// Configured gateways by name
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<String, AuditedGateway>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: AuditedGateway) -> Self {
        self.gateways.insert(gateway.name().to_string(), gateway);
        self
    }

    pub fn get(&self, name: &str) -> Result<&AuditedGateway, IntegrationError> {
        self.gateways
            .get(name)
            .ok_or_else(|| IntegrationError::GatewayNotConfigured(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.gateways.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    /// Accepts every payment; fails in transport while `failing` is set
    #[derive(Debug)]
    pub struct MockGateway {
        name: String,
        failing: AtomicBool,
    }

    impl MockGateway {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                failing: AtomicBool::new(false),
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), PortError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PortError::connection(format!("{} unreachable", self.name)));
            }
            Ok(())
        }
    }

    impl DomainPort for MockGateway {}

    #[async_trait]
    impl PaymentGateway for MockGateway {
        fn name(&self) -> &str {
            &self.name
        }

        async fn check_bill(&self, customer_ref: &str) -> Result<GatewayResponse, PortError> {
            self.check()?;
            Ok(GatewayResponse::ok(serde_json::json!({ "customer_ref": customer_ref })))
        }

        async fn process_payment(&self, request: &GatewayPaymentRequest) -> Result<GatewayResponse, PortError> {
            self.check()?;
            Ok(GatewayResponse::ok(serde_json::json!({ "trx_id": request.trx_id })))
        }

        async fn search_transaction(&self, trx_id: &str) -> Result<GatewayResponse, PortError> {
            self.check()?;
            Ok(GatewayResponse::ok(serde_json::json!({ "trx_id": trx_id, "status": "completed" })))
        }
    }

    #[derive(Debug, Default)]
    pub struct MockGatewayAuditStore {
        pub rows: RwLock<Vec<GatewayTransactionLog>>,
    }

    impl MockGatewayAuditStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn rows(&self) -> Vec<GatewayTransactionLog> {
            self.rows.read().await.clone()
        }
    }

    impl DomainPort for MockGatewayAuditStore {}

    #[async_trait]
    impl GatewayAuditStore for MockGatewayAuditStore {
        async fn record(&self, ctx: &TenantContext, log: &GatewayTransactionLog) -> Result<(), PortError> {
            let mut log = log.clone();
            log.company_id = ctx.stamp(log.company_id)?;
            self.rows.write().await.push(log);
            Ok(())
        }

        async fn list(
            &self,
            ctx: &TenantContext,
            gateway: Option<&str>,
            limit: u32,
        ) -> Result<Vec<GatewayTransactionLog>, PortError> {
            let scope = ctx.read_scope()?;
            let mut rows: Vec<_> = self
                .rows
                .read()
                .await
                .iter()
                .filter(|r| scope.allows(r.company_id))
                .filter(|r| gateway.map_or(true, |g| r.gateway == g))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows.truncate(limit as usize);
            Ok(rows)
        }
    }
}
