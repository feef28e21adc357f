//! Host-based tenant resolution
//!
//! Runs once per inbound request. The result is the `TenantContext` handed
//! to every downstream call for the rest of that request.

use std::sync::Arc;

use core_kernel::{TenancyError, TenantContext};

use crate::config::TenancyConfig;
use crate::error::CompanyError;
use crate::ports::CompanyDirectory;

/// Lowercases a host and strips any `:port` suffix
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let without_port = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    without_port.trim_end_matches('.').to_ascii_lowercase()
}

/// Returns the label before `.<base_domain>`, if `host` lives under it
///
/// `acme.example.com` under `example.com` yields `acme`; the base domain
/// itself and unrelated hosts yield `None`.
pub fn extract_subdomain<'a>(host: &'a str, base_domain: &str) -> Option<&'a str> {
    let prefix = host.strip_suffix(base_domain)?.strip_suffix('.')?;
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

/// Maps request hosts to tenant contexts
#[derive(Clone)]
pub struct TenantResolver {
    config: TenancyConfig,
    directory: Arc<dyn CompanyDirectory>,
}

impl TenantResolver {
    pub fn new(config: TenancyConfig, directory: Arc<dyn CompanyDirectory>) -> Self {
        Self { config, directory }
    }

    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Resolves a host to a tenant context
    ///
    /// # Errors
    ///
    /// Returns `TenancyError::TenantNotFound` if neither the super-admin
    /// domain, a company domain, nor a company subdomain matches.
    pub async fn resolve(&self, host: &str) -> Result<TenantContext, CompanyError> {
        let host = normalize_host(host);

        if host == normalize_host(&self.config.super_admin_domain) {
            tracing::debug!(host = %host, "resolved super-admin context");
            return Ok(TenantContext::super_admin());
        }

        let base_domain = normalize_host(&self.config.base_domain);
        let subdomain = extract_subdomain(&host, &base_domain);

        match self.directory.find_by_host(&host, subdomain).await? {
            Some(company) => {
                tracing::debug!(host = %host, company_id = %company.id, "resolved tenant");
                Ok(TenantContext::tenant(company.id))
            }
            None => Err(TenancyError::TenantNotFound(host).into()),
        }
    }
}
