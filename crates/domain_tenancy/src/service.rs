//! Company administration (super-admin only)

use std::sync::Arc;

use validator::Validate;

use core_kernel::{CompanyId, TenantContext};

use crate::company::{Company, CompanyStatus, CompanyUpdate, NewCompany};
use crate::config::CompanyDefaults;
use crate::error::CompanyError;
use crate::ports::CompanyDirectory;

/// Creates, updates, enables, and disables companies
#[derive(Clone)]
pub struct CompanyService {
    directory: Arc<dyn CompanyDirectory>,
    defaults: CompanyDefaults,
}

impl CompanyService {
    pub fn new(directory: Arc<dyn CompanyDirectory>, defaults: CompanyDefaults) -> Self {
        Self { directory, defaults }
    }

    /// Registers a new company
    ///
    /// # Errors
    ///
    /// * `Validation` if fields are malformed or not exactly one of
    ///   domain/subdomain is given
    /// * `HostKeyTaken` if the domain or subdomain is used by any company
    pub async fn create_company(
        &self,
        ctx: &TenantContext,
        request: NewCompany,
    ) -> Result<Company, CompanyError> {
        ctx.require_super_admin()?;
        request.validate()?;

        let company = Company::from_request(request, &self.defaults);
        ensure_single_host_key(&company)?;
        self.ensure_host_keys_free(&company, None).await?;

        self.directory.insert_company(&company).await?;
        tracing::info!(company_id = %company.id, name = %company.name, "company created");
        Ok(company)
    }

    /// Updates a company, re-validating host keys against all other companies
    pub async fn update_company(
        &self,
        ctx: &TenantContext,
        id: CompanyId,
        update: CompanyUpdate,
    ) -> Result<Company, CompanyError> {
        ctx.require_super_admin()?;
        update.validate()?;

        let mut company = self.directory.get_company(id).await?;
        let host_changed = update.domain.is_some() || update.subdomain.is_some();
        company.apply(update);

        if host_changed {
            ensure_single_host_key(&company)?;
            self.ensure_host_keys_free(&company, Some(id)).await?;
        }

        self.directory.update_company(&company).await?;
        tracing::info!(company_id = %company.id, "company updated");
        Ok(company)
    }

    pub async fn enable_company(&self, ctx: &TenantContext, id: CompanyId) -> Result<Company, CompanyError> {
        self.set_status(ctx, id, CompanyStatus::Active).await
    }

    pub async fn disable_company(&self, ctx: &TenantContext, id: CompanyId) -> Result<Company, CompanyError> {
        self.set_status(ctx, id, CompanyStatus::Inactive).await
    }

    pub async fn get_company(&self, ctx: &TenantContext, id: CompanyId) -> Result<Company, CompanyError> {
        // Tenants may read their own company
        if !ctx.read_scope()?.allows(id) {
            return Err(CompanyError::NotFound(id.to_string()));
        }
        Ok(self.directory.get_company(id).await?)
    }

    pub async fn list_companies(
        &self,
        ctx: &TenantContext,
        status: Option<CompanyStatus>,
    ) -> Result<Vec<Company>, CompanyError> {
        ctx.require_super_admin()?;
        Ok(self.directory.list_companies(status).await?)
    }

    async fn set_status(
        &self,
        ctx: &TenantContext,
        id: CompanyId,
        status: CompanyStatus,
    ) -> Result<Company, CompanyError> {
        ctx.require_super_admin()?;
        let mut company = self.directory.get_company(id).await?;
        company.status = status;
        company.updated_at = chrono::Utc::now();
        self.directory.update_company(&company).await?;
        tracing::info!(company_id = %id, status = status.as_str(), "company status changed");
        Ok(company)
    }

    async fn ensure_host_keys_free(
        &self,
        company: &Company,
        exclude: Option<CompanyId>,
    ) -> Result<(), CompanyError> {
        for key in company.host_keys() {
            if self.directory.host_key_taken(key, exclude).await? {
                return Err(CompanyError::HostKeyTaken(key.to_string()));
            }
        }
        Ok(())
    }
}

fn ensure_single_host_key(company: &Company) -> Result<(), CompanyError> {
    match (&company.domain, &company.subdomain) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        (None, None) => Err(CompanyError::Validation(
            "one of domain or subdomain is required".to_string(),
        )),
        (Some(_), Some(_)) => Err(CompanyError::Validation(
            "domain and subdomain are mutually exclusive".to_string(),
        )),
    }
}
