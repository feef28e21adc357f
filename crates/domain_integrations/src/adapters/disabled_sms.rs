//! SMS sender for deployments without a configured gateway

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError};

use crate::sms::{SmsDelivery, SmsSender};

/// Refuses every message with `ServiceUnavailable`
///
/// Each attempt is still logged as failed, so `sms:retry-failed` delivers
/// the backlog once a gateway is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSmsSender;

impl DomainPort for DisabledSmsSender {}

#[async_trait]
impl SmsSender for DisabledSmsSender {
    async fn send(&self, _phone_number: &str, _message: &str) -> Result<SmsDelivery, PortError> {
        Err(PortError::ServiceUnavailable {
            service: "sms gateway not configured".to_string(),
        })
    }
}
