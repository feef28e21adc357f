//! Infrastructure Database Layer
//!
//! PostgreSQL implementations of the billing platform's storage ports,
//! built on SQLx. The schema lives in the workspace `migrations/` directory
//! and is applied with [`run_migrations`].
//!
//! # Tenancy
//!
//! Every adapter takes the caller's `TenantContext` and enforces it inside
//! the statement it issues: owners are stamped on insert, locked and
//! checked on update, and filtered on read. A superadmin context reads
//! across companies; an uninitialized context fails before any query runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/isp_billing")).await?;
//! run_migrations(&pool).await?;
//! let billing = PostgresBillingStore::new(pool.clone());
//! ```

pub mod adapters;
pub mod error;
pub mod lock;
pub mod pool;
mod tenant;

pub use adapters::{
    PostgresBillingStore, PostgresBulkStore, PostgresCompanyDirectory, PostgresGatewayAuditStore,
    PostgresLedgerStore, PostgresSmsStore, PostgresTicketStore,
};
pub use error::DatabaseError;
pub use lock::JobLock;
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool, MIN_POOL_SIZE};
