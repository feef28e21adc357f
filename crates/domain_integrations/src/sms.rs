//! SMS delivery
//!
//! Messages are rendered from per-company templates, handed to an
//! `SmsSender`, and every attempt is persisted as an `SmsLog`. Failed
//! attempts are never retried in-line; `SmsDispatcher::retry_failed` resends
//! them from a scheduled job.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{CompanyId, DomainPort, PortError, SmsLogId, TenantContext};

use crate::error::IntegrationError;

/// What a template is used for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsCategory {
    /// Sent seven days before expiry
    ExpiryWarning,
    /// Sent on the expiry date
    SuspensionNotice,
    PaymentReceived,
    Custom(String),
}

impl SmsCategory {
    pub fn as_str(&self) -> &str {
        match self {
            SmsCategory::ExpiryWarning => "expiry_warning",
            SmsCategory::SuspensionNotice => "suspension_notice",
            SmsCategory::PaymentReceived => "payment_received",
            SmsCategory::Custom(name) => name,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "expiry_warning" => SmsCategory::ExpiryWarning,
            "suspension_notice" => SmsCategory::SuspensionNotice,
            "payment_received" => SmsCategory::PaymentReceived,
            other => SmsCategory::Custom(other.to_string()),
        }
    }
}

/// A company's message template with `{variable}` placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsTemplate {
    pub company_id: CompanyId,
    pub category: SmsCategory,
    pub body: String,
}

impl SmsTemplate {
    /// Substitutes every `{key}` with its value; unknown placeholders are kept
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        variables.iter().fold(self.body.clone(), |message, (key, value)| {
            message.replace(&format!("{{{}}}", key), value)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    Pending,
    Sent,
    Failed,
}

impl SmsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmsStatus::Pending => "pending",
            SmsStatus::Sent => "sent",
            SmsStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for SmsStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SmsStatus::Pending),
            "sent" => Ok(SmsStatus::Sent),
            "failed" => Ok(SmsStatus::Failed),
            other => Err(format!("unknown sms status: {}", other)),
        }
    }
}

/// The gateway's answer to a send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsDelivery {
    pub accepted: bool,
    pub response: String,
}

/// One delivery attempt (and its retries)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsLog {
    pub id: SmsLogId,
    pub company_id: CompanyId,
    pub phone_number: String,
    pub message: String,
    pub status: SmsStatus,
    pub response: Option<String>,
    pub attempts: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SmsLog {
    pub fn pending(company_id: CompanyId, phone_number: &str, message: &str) -> Self {
        Self {
            id: SmsLogId::new_v7(),
            company_id,
            phone_number: phone_number.to_string(),
            message: message.to_string(),
            status: SmsStatus::Pending,
            response: None,
            attempts: 0,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Records the outcome of one attempt
    pub fn record_attempt(&mut self, outcome: Result<SmsDelivery, PortError>) {
        self.attempts += 1;
        match outcome {
            Ok(delivery) if delivery.accepted => {
                self.status = SmsStatus::Sent;
                self.sent_at = Some(Utc::now());
                self.response = Some(delivery.response);
            }
            Ok(delivery) => {
                self.status = SmsStatus::Failed;
                self.response = Some(delivery.response);
            }
            Err(err) => {
                self.status = SmsStatus::Failed;
                self.response = Some(err.to_string());
            }
        }
    }
}

/// Delivers a rendered message to a phone number
#[async_trait]
pub trait SmsSender: DomainPort {
    async fn send(&self, phone_number: &str, message: &str) -> Result<SmsDelivery, PortError>;
}

/// Storage for templates and delivery logs
#[async_trait]
pub trait SmsStore: DomainPort {
    async fn find_template(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        category: &SmsCategory,
    ) -> Result<Option<SmsTemplate>, PortError>;

    async fn save_template(&self, ctx: &TenantContext, template: &SmsTemplate) -> Result<(), PortError>;

    async fn insert_log(&self, ctx: &TenantContext, log: &SmsLog) -> Result<(), PortError>;

    async fn update_log(&self, ctx: &TenantContext, log: &SmsLog) -> Result<(), PortError>;

    /// Failed logs visible in `ctx`, oldest first
    async fn failed_logs(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<SmsLog>, PortError>;
}

/// Sends messages and keeps the delivery log
#[derive(Clone)]
pub struct SmsDispatcher {
    sender: Arc<dyn SmsSender>,
    store: Arc<dyn SmsStore>,
}

impl SmsDispatcher {
    pub fn new(sender: Arc<dyn SmsSender>, store: Arc<dyn SmsStore>) -> Self {
        Self { sender, store }
    }

    pub fn store(&self) -> &Arc<dyn SmsStore> {
        &self.store
    }

    /// Renders `template` and sends it; returns whether the gateway accepted it
    pub async fn send_template(
        &self,
        ctx: &TenantContext,
        template: &SmsTemplate,
        phone_number: &str,
        variables: &HashMap<String, String>,
    ) -> Result<bool, IntegrationError> {
        let message = template.render(variables);
        self.send(ctx, template.company_id, phone_number, &message).await
    }

    /// Sends a message and logs the attempt
    ///
    /// Delivery failures are logged and reported as `Ok(false)`; only a
    /// failure to write the log is an error.
    pub async fn send(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        phone_number: &str,
        message: &str,
    ) -> Result<bool, IntegrationError> {
        let company_id = ctx.stamp(company_id).map_err(PortError::from)?;
        let mut log = SmsLog::pending(company_id, phone_number, message);

        let outcome = self.sender.send(phone_number, message).await;
        if let Err(ref err) = outcome {
            tracing::warn!(company_id = %company_id, phone = %phone_number, error = %err, "SMS delivery failed");
        }
        log.record_attempt(outcome);

        self.store.insert_log(ctx, &log).await?;
        Ok(log.status == SmsStatus::Sent)
    }

    /// Resends up to `limit` failed messages; returns how many were delivered
    pub async fn retry_failed(&self, ctx: &TenantContext, limit: u32) -> Result<usize, IntegrationError> {
        let failed = self.store.failed_logs(ctx, limit).await?;
        let mut delivered = 0;

        for mut log in failed {
            let outcome = self.sender.send(&log.phone_number, &log.message).await;
            log.record_attempt(outcome);
            self.store.update_log(ctx, &log).await?;

            if log.status == SmsStatus::Sent {
                delivered += 1;
            } else {
                tracing::debug!(sms_log_id = %log.id, attempts = log.attempts, "SMS retry failed");
            }
        }

        tracing::info!(delivered, "retried failed SMS");
        Ok(delivered)
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::RwLock;

    /// Captures sent messages; rejects them while `failing` is set
    #[derive(Debug, Default)]
    pub struct MockSmsSender {
        pub sent: RwLock<Vec<(String, String)>>,
        failing: AtomicBool,
    }

    impl MockSmsSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub async fn sent(&self) -> Vec<(String, String)> {
            self.sent.read().await.clone()
        }
    }

    impl DomainPort for MockSmsSender {}

    #[async_trait]
    impl SmsSender for MockSmsSender {
        async fn send(&self, phone_number: &str, message: &str) -> Result<SmsDelivery, PortError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PortError::ServiceUnavailable {
                    service: "sms-gateway".to_string(),
                });
            }
            self.sent
                .write()
                .await
                .push((phone_number.to_string(), message.to_string()));
            Ok(SmsDelivery {
                accepted: true,
                response: "OK".to_string(),
            })
        }
    }

    #[derive(Debug, Default)]
    pub struct MockSmsStore {
        pub templates: RwLock<Vec<SmsTemplate>>,
        pub logs: RwLock<Vec<SmsLog>>,
    }

    impl MockSmsStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn logs(&self) -> Vec<SmsLog> {
            self.logs.read().await.clone()
        }
    }

    impl DomainPort for MockSmsStore {}

    #[async_trait]
    impl SmsStore for MockSmsStore {
        async fn find_template(
            &self,
            ctx: &TenantContext,
            company_id: CompanyId,
            category: &SmsCategory,
        ) -> Result<Option<SmsTemplate>, PortError> {
            let scope = ctx.read_scope()?;
            Ok(self
                .templates
                .read()
                .await
                .iter()
                .find(|t| t.company_id == company_id && scope.allows(t.company_id) && &t.category == category)
                .cloned())
        }

        async fn save_template(&self, ctx: &TenantContext, template: &SmsTemplate) -> Result<(), PortError> {
            let mut template = template.clone();
            template.company_id = ctx.stamp(template.company_id)?;
            let mut templates = self.templates.write().await;
            templates.retain(|t| !(t.company_id == template.company_id && t.category == template.category));
            templates.push(template);
            Ok(())
        }

        async fn insert_log(&self, ctx: &TenantContext, log: &SmsLog) -> Result<(), PortError> {
            let mut log = log.clone();
            log.company_id = ctx.stamp(log.company_id)?;
            self.logs.write().await.push(log);
            Ok(())
        }

        async fn update_log(&self, ctx: &TenantContext, log: &SmsLog) -> Result<(), PortError> {
            let mut logs = self.logs.write().await;
            let stored = logs
                .iter_mut()
                .find(|l| l.id == log.id)
                .ok_or_else(|| PortError::not_found("SmsLog", log.id))?;
            ctx.authorize_write(stored.company_id)?;
            let owner = stored.company_id;
            *stored = log.clone();
            stored.company_id = owner;
            Ok(())
        }

        async fn failed_logs(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<SmsLog>, PortError> {
            let scope = ctx.read_scope()?;
            let mut failed: Vec<_> = self
                .logs
                .read()
                .await
                .iter()
                .filter(|l| l.status == SmsStatus::Failed && scope.allows(l.company_id))
                .cloned()
                .collect();
            failed.sort_by_key(|l| l.created_at);
            failed.truncate(limit as usize);
            Ok(failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockSmsSender, MockSmsStore};
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn template(company_id: CompanyId) -> SmsTemplate {
        SmsTemplate {
            company_id,
            category: SmsCategory::ExpiryWarning,
            body: "Dear {name}, your {package} plan expires on {expiry_date}.".to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_variables() {
        let rendered = template(CompanyId::new()).render(&vars(&[
            ("name", "Rahim"),
            ("package", "10 Mbps"),
            ("expiry_date", "2025-03-17"),
        ]));
        assert_eq!(rendered, "Dear Rahim, your 10 Mbps plan expires on 2025-03-17.");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let rendered = template(CompanyId::new()).render(&vars(&[("name", "Rahim")]));
        assert!(rendered.contains("{package}"));
    }

    #[tokio::test]
    async fn test_failed_send_is_logged_then_retried() {
        let company = CompanyId::new();
        let ctx = TenantContext::tenant(company);
        let sender = Arc::new(MockSmsSender::new());
        let store = Arc::new(MockSmsStore::new());
        let dispatcher = SmsDispatcher::new(sender.clone(), store.clone());

        sender.set_failing(true);
        let sent = dispatcher
            .send_template(&ctx, &template(company), "01700000000", &vars(&[("name", "Rahim")]))
            .await
            .unwrap();
        assert!(!sent);
        assert_eq!(store.logs().await[0].status, SmsStatus::Failed);

        sender.set_failing(false);
        let delivered = dispatcher.retry_failed(&ctx, 10).await.unwrap();
        assert_eq!(delivered, 1);

        let logs = store.logs().await;
        assert_eq!(logs[0].status, SmsStatus::Sent);
        assert_eq!(logs[0].attempts, 2);
        assert_eq!(sender.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retry_respects_limit_and_tenant() {
        let a = CompanyId::new();
        let b = CompanyId::new();
        let sender = Arc::new(MockSmsSender::new());
        let store = Arc::new(MockSmsStore::new());
        let dispatcher = SmsDispatcher::new(sender.clone(), store.clone());

        sender.set_failing(true);
        for company in [a, a, a, b] {
            dispatcher
                .send(&TenantContext::tenant(company), company, "017", "hello")
                .await
                .unwrap();
        }
        sender.set_failing(false);

        assert_eq!(dispatcher.retry_failed(&TenantContext::tenant(a), 2).await.unwrap(), 2);
        assert_eq!(dispatcher.retry_failed(&TenantContext::super_admin(), 10).await.unwrap(), 2);
    }
}
