//! HTTP SMS gateway adapter
//!
//! Most local SMS aggregators expose a single endpoint taking the
//! destination and message as query or form parameters, plus fixed
//! credentials. The configured `params` are sent with every request and
//! `to`/`message` (and `from`, if a sender id is set) are added per call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError};

use crate::sms::{SmsDelivery, SmsSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsHttpMethod {
    Get,
    #[default]
    Post,
    Json,
}

/// Configuration for an HTTP SMS gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSmsConfig {
    pub gateway_url: String,
    #[serde(default)]
    pub http_method: SmsHttpMethod,
    /// Fixed parameters (API keys, account ids)
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub sender_id: Option<String>,
    /// Key/value pairs that must appear in a JSON response body for the
    /// message to count as accepted
    #[serde(default)]
    pub success_indicators: HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

/// `SmsSender` backed by an HTTP gateway
#[derive(Debug, Clone)]
pub struct HttpSmsSender {
    config: HttpSmsConfig,
    client: reqwest::Client,
}

impl HttpSmsSender {
    pub fn new(config: HttpSmsConfig) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PortError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn request_params(&self, phone_number: &str, message: &str) -> HashMap<String, String> {
        let mut params = self.config.params.clone();
        params.insert("to".to_string(), phone_number.to_string());
        params.insert("message".to_string(), message.to_string());
        if let Some(ref sender_id) = self.config.sender_id {
            params.insert("from".to_string(), sender_id.clone());
        }
        params
    }

    fn is_accepted(&self, body: &str) -> bool {
        if self.config.success_indicators.is_empty() {
            return true;
        }
        let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
            return false;
        };
        self.config.success_indicators.iter().all(|(key, expected)| {
            match json.get(key) {
                Some(serde_json::Value::String(s)) => s == expected,
                Some(other) => other.to_string() == *expected,
                None => false,
            }
        })
    }
}

impl DomainPort for HttpSmsSender {}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send(&self, phone_number: &str, message: &str) -> Result<SmsDelivery, PortError> {
        let params = self.request_params(phone_number, message);

        let mut request = match self.config.http_method {
            SmsHttpMethod::Get => self.client.get(&self.config.gateway_url).query(&params),
            SmsHttpMethod::Post => self.client.post(&self.config.gateway_url).form(&params),
            SmsHttpMethod::Json => self.client.post(&self.config.gateway_url).json(&params),
        };
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PortError::Timeout {
                    operation: "sms send".to_string(),
                    duration_ms: self.config.timeout_secs * 1000,
                }
            } else {
                PortError::connection(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PortError::connection(e.to_string()))?;

        Ok(SmsDelivery {
            accepted: status.is_success() && self.is_accepted(&body),
            response: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(indicators: &[(&str, &str)]) -> HttpSmsSender {
        HttpSmsSender::new(HttpSmsConfig {
            gateway_url: "http://localhost/sms".to_string(),
            http_method: SmsHttpMethod::Get,
            params: HashMap::from([("api_key".to_string(), "k".to_string())]),
            headers: HashMap::new(),
            sender_id: Some("ISP".to_string()),
            success_indicators: indicators
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_request_params_include_fixed_and_per_call() {
        let params = sender(&[]).request_params("017", "hi");
        assert_eq!(params["api_key"], "k");
        assert_eq!(params["to"], "017");
        assert_eq!(params["message"], "hi");
        assert_eq!(params["from"], "ISP");
    }

    #[test]
    fn test_success_indicators() {
        let s = sender(&[("status", "ok"), ("code", "200")]);
        assert!(s.is_accepted(r#"{"status":"ok","code":200}"#));
        assert!(!s.is_accepted(r#"{"status":"error","code":200}"#));
        assert!(!s.is_accepted("not json"));
        assert!(sender(&[]).is_accepted("anything"));
    }
}
