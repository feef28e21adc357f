//! Tenancy Domain Ports
//!
//! `CompanyDirectory` is the storage port for companies. It is the one
//! table that is not tenant-scoped, so its methods take no `TenantContext`;
//! access control is applied by `CompanyService` (super-admin only writes)
//! and `TenantResolver` (host lookup).

use async_trait::async_trait;

use core_kernel::{CompanyId, DomainPort, HealthCheckable, PortError};

use crate::company::{Company, CompanyStatus};

/// Storage port for companies
#[async_trait]
pub trait CompanyDirectory: DomainPort + HealthCheckable {
    /// Retrieves a company by ID
    async fn get_company(&self, id: CompanyId) -> Result<Company, PortError>;

    /// Finds the company reachable under a host
    ///
    /// # Arguments
    ///
    /// * `domain` - The full host, matched exactly against `domain`
    /// * `subdomain` - The derived label, matched exactly against `subdomain`
    async fn find_by_host(
        &self,
        domain: &str,
        subdomain: Option<&str>,
    ) -> Result<Option<Company>, PortError>;

    /// Lists companies, optionally filtered by status
    async fn list_companies(&self, status: Option<CompanyStatus>) -> Result<Vec<Company>, PortError>;

    /// Returns true if `key` is already used as any company's domain or
    /// subdomain, ignoring `exclude`
    async fn host_key_taken(&self, key: &str, exclude: Option<CompanyId>) -> Result<bool, PortError>;

    /// Inserts a new company
    async fn insert_company(&self, company: &Company) -> Result<(), PortError>;

    /// Replaces a stored company
    async fn update_company(&self, company: &Company) -> Result<(), PortError>;
}

/// In-memory adapter for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use chrono::Utc;
    use core_kernel::{AdapterHealth, HealthCheckResult};

    /// In-memory mock implementation of CompanyDirectory
    #[derive(Debug, Default, Clone)]
    pub struct MockCompanyDirectory {
        companies: Arc<RwLock<HashMap<CompanyId, Company>>>,
    }

    impl MockCompanyDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with companies for testing
        pub async fn with_companies(companies: Vec<Company>) -> Self {
            let port = Self::new();
            for company in companies {
                port.companies.write().await.insert(company.id, company);
            }
            port
        }
    }

    impl DomainPort for MockCompanyDirectory {}

    #[async_trait]
    impl HealthCheckable for MockCompanyDirectory {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "mock-company-directory".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: None,
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl CompanyDirectory for MockCompanyDirectory {
        async fn get_company(&self, id: CompanyId) -> Result<Company, PortError> {
            self.companies
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Company", id))
        }

        async fn find_by_host(
            &self,
            domain: &str,
            subdomain: Option<&str>,
        ) -> Result<Option<Company>, PortError> {
            let companies = self.companies.read().await;
            let by_domain = companies
                .values()
                .find(|c| c.domain.as_deref() == Some(domain));
            let by_subdomain = || {
                subdomain.and_then(|sub| {
                    companies.values().find(|c| c.subdomain.as_deref() == Some(sub))
                })
            };
            Ok(by_domain.or_else(by_subdomain).cloned())
        }

        async fn list_companies(&self, status: Option<CompanyStatus>) -> Result<Vec<Company>, PortError> {
            let companies = self.companies.read().await;
            let mut result: Vec<_> = companies
                .values()
                .filter(|c| status.map_or(true, |s| c.status == s))
                .cloned()
                .collect();
            result.sort_by_key(|c| c.created_at);
            Ok(result)
        }

        async fn host_key_taken(&self, key: &str, exclude: Option<CompanyId>) -> Result<bool, PortError> {
            let companies = self.companies.read().await;
            Ok(companies
                .values()
                .filter(|c| Some(c.id) != exclude)
                .any(|c| c.host_keys().any(|k| k == key)))
        }

        async fn insert_company(&self, company: &Company) -> Result<(), PortError> {
            let mut companies = self.companies.write().await;
            if companies.contains_key(&company.id) {
                return Err(PortError::conflict(format!("company {} exists", company.id)));
            }
            companies.insert(company.id, company.clone());
            Ok(())
        }

        async fn update_company(&self, company: &Company) -> Result<(), PortError> {
            let mut companies = self.companies.write().await;
            match companies.get_mut(&company.id) {
                Some(stored) => {
                    *stored = company.clone();
                    Ok(())
                }
                None => Err(PortError::not_found("Company", company.id)),
            }
        }
    }
}
