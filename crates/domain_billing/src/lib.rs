//! Billing Domain - subscribers, invoicing, payments and the expiry lifecycle
//!
//! This crate holds the billing engine of the platform:
//!
//! - **Customers** and their **packages**
//! - **Invoices**, one per billing cycle, numbered `INV-YYYYMMDD-NNNN` from
//!   an atomic per-company, per-day counter
//! - **Payments**, which reconcile invoices and accrue reseller
//!   **commissions** off the package price
//! - The **expiry lifecycle**: month extension on payment, and moving
//!   unpaid customers to the expired package with a best-effort router
//!   disable
//! - The SMS **notification sweep** ahead of and on the expiry date
//!
//! Customer type changes the rules: `free` customers are never invoiced or
//! expired, `vip` customers are invoiced but never auto-disabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingEngine, NewPayment, PaymentMethod};
//!
//! let engine = BillingEngine::new(store, companies, routers, clock);
//! let created = engine.generate_invoices_for_company(&ctx, company_id).await?;
//!
//! let outcome = engine
//!     .process_payment(&ctx, NewPayment::new(customer_id, amount, PaymentMethod::Receive))
//!     .await?;
//! ```

pub mod commission;
pub mod customer;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod invoice;
pub mod notifications;
pub mod package;
pub mod payment;
pub mod ports;
pub mod service;

pub use commission::{CommissionStatus, ResellerCommission, ResellerProfile};
pub use customer::{
    Customer, CustomerQuery, CustomerStatus, CustomerType, CustomerUpdate, NewCustomer,
};
pub use engine::{BillingEngine, ExpirationSummary, PaymentOutcome};
pub use error::{validation_messages, BillingError};
pub use expiry::{is_past, next_expiry, ExpiryOutcome, PaymentType};
pub use invoice::{Invoice, InvoiceNumber, InvoiceQuery, InvoiceStatus, DUE_AFTER_DAYS};
pub use notifications::{NotificationService, NotificationSummary, DEFAULT_RETRY_LIMIT};
pub use package::{InvoicePricing, NewPackage, Package};
pub use payment::{NewPayment, Payment, PaymentMethod};
pub use ports::{BillingStore, PaymentRecord, RecordedPayment};
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockBillingStore;
pub use service::CustomerService;
