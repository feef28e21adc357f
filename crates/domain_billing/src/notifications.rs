//! Expiry SMS notifications
//!
//! Active customers expiring seven days from today receive the company's
//! `expiry_warning` template; those expiring today receive
//! `suspension_notice`. A company without the template is skipped for that
//! category.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use core_kernel::{add_days, Clock, CompanyId, TenantContext};
use domain_integrations::{SmsCategory, SmsDispatcher, SmsStore};
use domain_tenancy::CompanyDirectory;

use crate::customer::{Customer, CustomerQuery};
use crate::error::BillingError;
use crate::ports::BillingStore;

/// Days before expiry the warning goes out
pub const WARNING_LEAD_DAYS: u64 = 7;

/// Default batch size for `retry_failed`
pub const DEFAULT_RETRY_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    pub warnings_sent: usize,
    pub suspensions_sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn BillingStore>,
    companies: Arc<dyn CompanyDirectory>,
    sms: SmsDispatcher,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn BillingStore>,
        companies: Arc<dyn CompanyDirectory>,
        sms: SmsDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            companies,
            sms,
            clock,
        }
    }

    /// Sends the expiry warning and suspension notice sweeps for a company
    pub async fn send_expiry_notifications(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
    ) -> Result<NotificationSummary, BillingError> {
        ctx.authorize_write(company_id)?;
        let company = self.companies.get_company(company_id).await?;
        let today = self.clock.today_in(company.timezone);

        let mut summary = NotificationSummary::default();
        let warning_date = add_days(today, WARNING_LEAD_DAYS)?;
        let (sent, failed) = self
            .sweep(ctx, company_id, SmsCategory::ExpiryWarning, warning_date)
            .await?;
        summary.warnings_sent = sent;
        summary.failed += failed;

        let (sent, failed) = self
            .sweep(ctx, company_id, SmsCategory::SuspensionNotice, today)
            .await?;
        summary.suspensions_sent = sent;
        summary.failed += failed;

        info!(
            company_id = %company_id,
            warnings = summary.warnings_sent,
            suspensions = summary.suspensions_sent,
            failed = summary.failed,
            "expiry notifications sent"
        );
        Ok(summary)
    }

    async fn sweep(
        &self,
        ctx: &TenantContext,
        company_id: CompanyId,
        category: SmsCategory,
        expiring_on: NaiveDate,
    ) -> Result<(usize, usize), BillingError> {
        let Some(template) = self.sms.store().find_template(ctx, company_id, &category).await? else {
            info!(company_id = %company_id, category = category.as_str(), "no template, skipping");
            return Ok((0, 0));
        };

        let query = CustomerQuery {
            expiring_on: Some(expiring_on),
            ..CustomerQuery::active_in(company_id)
        };
        let customers = self.store.list_customers(ctx, &query).await?;

        let (mut sent, mut failed) = (0, 0);
        for customer in &customers {
            let variables = self.variables(ctx, customer).await;
            match self.sms.send_template(ctx, &template, &customer.phone, &variables).await {
                Ok(true) => sent += 1,
                Ok(false) => failed += 1,
                Err(err) => {
                    warn!(customer_id = %customer.id, error = %err, "SMS not logged");
                    failed += 1;
                }
            }
        }
        Ok((sent, failed))
    }

    async fn variables(&self, ctx: &TenantContext, customer: &Customer) -> HashMap<String, String> {
        let package = match customer.package_id {
            Some(id) => self.store.get_package(ctx, id).await.ok().map(|p| p.name),
            None => None,
        };
        HashMap::from([
            ("name".to_string(), customer.name.clone()),
            ("package".to_string(), package.unwrap_or_else(|| "N/A".to_string())),
            (
                "expiry_date".to_string(),
                customer
                    .expiry_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
        ])
    }

    /// Resends failed messages visible in `ctx`
    pub async fn retry_failed(&self, ctx: &TenantContext, limit: u32) -> Result<usize, BillingError> {
        Ok(self.sms.retry_failed(ctx, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::FixedClock;
    use domain_integrations::sms::mock::{MockSmsSender, MockSmsStore};
    use domain_integrations::SmsTemplate;
    use domain_tenancy::{Company, MockCompanyDirectory, NewCompany, TenancyConfig};

    use crate::customer::NewCustomer;
    use crate::ports::mock::MockBillingStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_warning_and_suspension_sweep() {
        let company = Company::from_request(
            NewCompany {
                name: "Alpha Net".to_string(),
                subdomain: Some("alpha".to_string()),
                ..Default::default()
            },
            &TenancyConfig::default().company_defaults(),
        );
        let ctx = TenantContext::tenant(company.id);
        let store = MockBillingStore::new();
        let sender = Arc::new(MockSmsSender::new());
        let sms_store = Arc::new(MockSmsStore::new());
        sms_store
            .save_template(
                &ctx,
                &SmsTemplate {
                    company_id: company.id,
                    category: SmsCategory::ExpiryWarning,
                    body: "Dear {name}, your {package} plan expires on {expiry_date}".to_string(),
                },
            )
            .await
            .unwrap();

        let today = date(2025, 3, 10);
        for (username, expiry) in [("soon", date(2025, 3, 17)), ("today", today), ("later", date(2025, 3, 18))] {
            let mut c = Customer::from_request(
                company.id,
                NewCustomer {
                    name: username.to_string(),
                    phone: format!("017{}", username.len()),
                    username: username.to_string(),
                    password: "secret1".to_string(),
                    ..Default::default()
                },
                today,
            );
            c.expiry_date = Some(expiry);
            store.seed_customer(c).await;
        }

        let service = NotificationService::new(
            Arc::new(store),
            Arc::new(MockCompanyDirectory::with_companies(vec![company.clone()]).await),
            SmsDispatcher::new(sender.clone(), sms_store.clone()),
            Arc::new(FixedClock::at_date(today)),
        );

        let summary = service.send_expiry_notifications(&ctx, company.id).await.unwrap();
        assert_eq!(summary.warnings_sent, 1);
        // no suspension template configured
        assert_eq!(summary.suspensions_sent, 0);

        let sent = sender.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Dear soon, your N/A plan expires on 2025-03-17");
        assert_eq!(sms_store.logs().await.len(), 1);
    }
}
