//! Core Kernel - Foundational types for the ISP billing platform
//!
//! This crate provides the building blocks shared by every domain crate:
//! - Strongly-typed identifiers for tenant-owned entities
//! - Decimal money helpers with fixed 2 dp rounding
//! - Calendar arithmetic and an injectable clock
//! - The explicit tenant context threaded through every data-access call
//! - The adapter-boundary error type used by all ports

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod tenant;
pub mod ports;

pub use money::{MoneyError, round_money, percent_of, ensure_positive, MONEY_DP};
pub use temporal::{Clock, SystemClock, FixedClock, Timezone, TemporalError, add_months_clamped, add_days};
pub use identifiers::{
    CompanyId, CustomerId, PackageId, InvoiceId, PaymentId, UserId, CommissionId,
    FundTransferId, BulkImportId, PopId, RouterId, SmsLogId, GatewayTransactionId, TicketId, TicketLogId,
};
pub use tenant::{TenantContext, ReadScope, TenancyError};
pub use ports::{PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth};
