//! Storage port for bulk mutations and import records
//!
//! Every mutation takes one chunk of ids and applies to all of them or none.
//! A chunk naming a customer owned by another tenant fails with
//! `CrossTenantViolation`; unknown ids are skipped and do not count as
//! affected.

use async_trait::async_trait;
use chrono::NaiveDate;

use core_kernel::{
    BulkImportId, CustomerId, DomainPort, HealthCheckable, PackageId, PortError, TenantContext,
};
use domain_billing::CustomerStatus;

use crate::import::BulkImport;

#[async_trait]
pub trait BulkStore: DomainPort + HealthCheckable {
    /// Adds `days` to each expiry; a missing expiry extends from `today`
    async fn extend_expiry(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
        days: u32,
        today: NaiveDate,
    ) -> Result<u64, PortError>;

    async fn change_package(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
        package_id: PackageId,
    ) -> Result<u64, PortError>;

    async fn set_status(
        &self,
        ctx: &TenantContext,
        ids: &[CustomerId],
        status: CustomerStatus,
    ) -> Result<u64, PortError>;

    async fn insert_import(&self, ctx: &TenantContext, import: &BulkImport) -> Result<BulkImport, PortError>;

    async fn update_import(&self, ctx: &TenantContext, import: &BulkImport) -> Result<(), PortError>;

    async fn get_import(&self, ctx: &TenantContext, id: BulkImportId) -> Result<BulkImport, PortError>;

    /// Newest first
    async fn list_imports(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<BulkImport>, PortError>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::RwLock;

    use core_kernel::{add_days, AdapterHealth, HealthCheckResult};
    use domain_billing::ports::mock::{MockBillingStore, Shared};
    use domain_billing::Customer;

    /// In-memory BulkStore over the billing mock's customer table
    #[derive(Debug, Clone)]
    pub struct MockBulkStore {
        customers: Shared<CustomerId, Customer>,
        imports: Shared<BulkImportId, BulkImport>,
    }

    impl MockBulkStore {
        pub fn new(billing: &MockBillingStore) -> Self {
            Self {
                customers: billing.customers.clone(),
                imports: Arc::new(RwLock::new(HashMap::new())),
            }
        }

        /// Applies `change` to every known id in the chunk
        ///
        /// Ownership and `change` run against copies of every row before any
        /// row is written back, so one failing row leaves the chunk untouched.
        async fn apply(
            &self,
            ctx: &TenantContext,
            ids: &[CustomerId],
            mut change: impl FnMut(&mut Customer) -> Result<(), PortError>,
        ) -> Result<u64, PortError> {
            let mut customers = self.customers.write().await;

            let mut changed: HashMap<CustomerId, Customer> = HashMap::with_capacity(ids.len());
            for id in ids {
                if changed.contains_key(id) {
                    continue;
                }
                if let Some(customer) = customers.get(id) {
                    ctx.authorize_write(customer.company_id)?;
                    let mut customer = customer.clone();
                    change(&mut customer)?;
                    customer.touch();
                    changed.insert(*id, customer);
                }
            }

            let mut affected = 0;
            for (id, customer) in changed {
                customers.insert(id, customer);
                affected += 1;
            }
            Ok(affected)
        }
    }

    impl DomainPort for MockBulkStore {}

    #[async_trait]
    impl HealthCheckable for MockBulkStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-bulk-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BulkStore for MockBulkStore {
        async fn extend_expiry(
            &self,
            ctx: &TenantContext,
            ids: &[CustomerId],
            days: u32,
            today: NaiveDate,
        ) -> Result<u64, PortError> {
            self.apply(ctx, ids, |c| {
                let date = add_days(c.expiry_date.unwrap_or(today), u64::from(days))
                    .map_err(|err| PortError::validation(format!("expiry date out of range: {}", err)))?;
                c.expiry_date = Some(date);
                Ok(())
            })
            .await
        }

        async fn change_package(
            &self,
            ctx: &TenantContext,
            ids: &[CustomerId],
            package_id: PackageId,
        ) -> Result<u64, PortError> {
            self.apply(ctx, ids, |c| {
                c.package_id = Some(package_id);
                Ok(())
            })
            .await
        }

        async fn set_status(
            &self,
            ctx: &TenantContext,
            ids: &[CustomerId],
            status: CustomerStatus,
        ) -> Result<u64, PortError> {
            self.apply(ctx, ids, |c| {
                c.status = status;
                Ok(())
            })
            .await
        }

        async fn insert_import(&self, ctx: &TenantContext, import: &BulkImport) -> Result<BulkImport, PortError> {
            let mut stored = import.clone();
            stored.company_id = ctx.stamp(import.company_id)?;
            self.imports.write().await.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn update_import(&self, ctx: &TenantContext, import: &BulkImport) -> Result<(), PortError> {
            let mut imports = self.imports.write().await;
            let stored = imports
                .get_mut(&import.id)
                .ok_or_else(|| PortError::not_found("BulkImport", import.id))?;
            ctx.authorize_write(stored.company_id)?;
            let owner = stored.company_id;
            *stored = import.clone();
            stored.company_id = owner;
            Ok(())
        }

        async fn get_import(&self, ctx: &TenantContext, id: BulkImportId) -> Result<BulkImport, PortError> {
            let scope = ctx.read_scope()?;
            self.imports
                .read()
                .await
                .get(&id)
                .filter(|i| scope.allows(i.company_id))
                .cloned()
                .ok_or_else(|| PortError::not_found("BulkImport", id))
        }

        async fn list_imports(&self, ctx: &TenantContext, limit: u32) -> Result<Vec<BulkImport>, PortError> {
            let scope = ctx.read_scope()?;
            let mut result: Vec<_> = self
                .imports
                .read()
                .await
                .values()
                .filter(|i| scope.allows(i.company_id))
                .cloned()
                .collect();
            result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            result.truncate(limit as usize);
            Ok(result)
        }
    }
}
