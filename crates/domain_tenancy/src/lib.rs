//! Tenancy Domain
//!
//! A company is an isolated ISP operator. Every other entity in the platform
//! belongs to exactly one company, and each inbound request is bound to a
//! company by its host name:
//!
//! - `admin.example.com` (the configured super-admin domain) ⇒ super-admin
//! - `isp.net` (a company's own `domain`) ⇒ that company
//! - `acme.example.com` (subdomain under the configured base domain) ⇒ the
//!   company whose `subdomain` is `acme`
//!
//! Anything else is rejected with `TenantNotFound`.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_tenancy::{TenantResolver, TenancyConfig};
//!
//! let resolver = TenantResolver::new(TenancyConfig::default(), directory);
//! let ctx = resolver.resolve("acme.example.com").await?;
//! ```

pub mod company;
pub mod config;
pub mod error;
pub mod ports;
pub mod resolver;
pub mod service;

pub use company::{Company, CompanyStatus, NewCompany, CompanyUpdate};
pub use config::{TenancyConfig, CompanyDefaults};
pub use error::CompanyError;
pub use ports::CompanyDirectory;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockCompanyDirectory;
pub use resolver::{TenantResolver, normalize_host, extract_subdomain};
pub use service::CompanyService;
