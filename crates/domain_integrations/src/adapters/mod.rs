//! Concrete adapters for the integration ports
//!
//! - **HttpSmsSender**: generic HTTP SMS gateway (GET/POST/JSON)
//! - **DisabledRouterConnector**: used when router integration is switched off
//! - **DisabledSmsSender**: used when no SMS gateway is configured
//!
//! In-memory mocks live next to each port trait behind the `mock` feature.

pub mod disabled_sms;
pub mod http_sms;
pub mod router;

pub use disabled_sms::DisabledSmsSender;
pub use http_sms::{HttpSmsConfig, HttpSmsSender, SmsHttpMethod};
pub use router::DisabledRouterConnector;
