//! External collaborators
//!
//! The billing core talks to three kinds of outside systems, each behind a
//! port trait so the core never depends on a wire protocol:
//!
//! - **Routers** (`RouterControl`): PPPoE user provisioning on MikroTik
//!   devices. Expiry processing disables users best-effort.
//! - **SMS** (`SmsSender`): delivery of rendered templates. Every attempt is
//!   logged, and failures are retried by a separate job.
//! - **Payment gateways** (`PaymentGateway`): bKash / Nagad style bill
//!   lookup, payment, and transaction search. `AuditedGateway` writes an
//!   immutable audit row for every call, successful or not.

pub mod adapters;
pub mod error;
pub mod gateway;
pub mod router;
pub mod sms;

pub use error::IntegrationError;
pub use gateway::{
    AuditedGateway, GatewayAuditStore, GatewayRegistry, GatewayPaymentRequest, GatewayResponse,
    GatewayTransactionLog, GatewayTransactionType, PaymentGateway,
};
pub use router::{PppProfile, PppSession, RouterConnector, RouterControl};
pub use sms::{
    SmsCategory, SmsDelivery, SmsDispatcher, SmsLog, SmsSender, SmsStatus, SmsStore, SmsTemplate,
};
pub use adapters::{DisabledRouterConnector, DisabledSmsSender, HttpSmsConfig, HttpSmsSender, SmsHttpMethod};
