//! Test Utilities Crate
//!
//! Shared test infrastructure for the billing platform test suite.
//!
//! # Modules
//!
//! - `fixtures`: fixed dates, tenancy settings, companies and principals
//! - `builders`: builders for packages and customers
//! - `platform`: every port backed by its in-memory mock
//! - `database`: PostgreSQL test containers with the schema applied
//! - `generators`: property-based test data generators

pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod platform;

pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use platform::MockPlatform;
