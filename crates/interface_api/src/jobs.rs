//! Scheduled jobs
//!
//! Each job sweeps every active company under that company's own tenant
//! context. Invoice generation only visits companies whose billing day is
//! today in their own timezone. A company that fails is logged and counted; the sweep carries
//! on with the next one. The `isp-billing-jobs` binary wraps each run in a
//! named advisory lock so overlapping runs exit without work.

use thiserror::Error;
use tracing::{debug, error, info};

use core_kernel::TenantContext;
use domain_billing::{BillingError, DEFAULT_RETRY_LIMIT};
use domain_reseller::LedgerError;
use domain_tenancy::{Company, CompanyError, CompanyStatus};

use crate::AppState;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Company(#[from] CompanyError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A job and its options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    GenerateInvoices,
    ProcessExpirations,
    /// Pays out pending commissions, or only releases them when not immediate
    CalculateCommissions { immediate: bool },
    /// Credits commissions released by a deferred payout
    SettleCommissions,
    SendNotifications,
    RetryFailedSms { limit: u32 },
}

impl Job {
    /// Parses `<command> [options]`
    pub fn parse<I, S>(args: I) -> Result<Self, JobError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        let command = args
            .next()
            .ok_or_else(|| JobError::InvalidArgument("missing command".to_string()))?;
        let options: Vec<String> = args.map(|a| a.as_ref().to_string()).collect();

        let job = match command.as_ref() {
            "billing:generate-invoices" => Job::GenerateInvoices,
            "billing:process-expirations" => Job::ProcessExpirations,
            "reseller:calculate-commissions" => Job::CalculateCommissions {
                immediate: options.iter().any(|o| o == "--immediate"),
            },
            "reseller:settle-commissions" => Job::SettleCommissions,
            "sms:send-notifications" => Job::SendNotifications,
            "sms:retry-failed" => Job::RetryFailedSms {
                limit: parse_limit(&options)?.unwrap_or(DEFAULT_RETRY_LIMIT),
            },
            other => return Err(JobError::UnknownCommand(other.to_string())),
        };
        Ok(job)
    }

    /// Command name, also used as the run-lock key
    pub fn name(&self) -> &'static str {
        match self {
            Job::GenerateInvoices => "billing:generate-invoices",
            Job::ProcessExpirations => "billing:process-expirations",
            Job::CalculateCommissions { .. } => "reseller:calculate-commissions",
            Job::SettleCommissions => "reseller:settle-commissions",
            Job::SendNotifications => "sms:send-notifications",
            Job::RetryFailedSms { .. } => "sms:retry-failed",
        }
    }
}

/// Accepts `--limit=N` and `--limit N`
fn parse_limit(options: &[String]) -> Result<Option<u32>, JobError> {
    let mut iter = options.iter();
    while let Some(option) = iter.next() {
        let value = if let Some(value) = option.strip_prefix("--limit=") {
            value.to_string()
        } else if option == "--limit" {
            iter.next()
                .cloned()
                .ok_or_else(|| JobError::InvalidArgument("--limit needs a value".to_string()))?
        } else {
            continue;
        };
        return value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| JobError::InvalidArgument(format!("--limit must be a number, got {}", value)));
    }
    Ok(None)
}

/// What one run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub companies: usize,
    /// Companies passed over because today is not their billing day
    pub skipped_companies: usize,
    pub failed_companies: usize,
    /// Invoices created, customers expired, payouts made, messages sent
    pub processed: usize,
}

/// Runs `job` over every active company
pub async fn run(state: &AppState, job: Job) -> Result<JobReport, JobError> {
    let admin = TenantContext::super_admin();
    let mut report = JobReport::default();

    if let Job::RetryFailedSms { limit } = job {
        report.processed = state.notifications.retry_failed(&admin, limit).await?;
        info!(job = job.name(), delivered = report.processed, "job finished");
        return Ok(report);
    }

    let companies = state
        .companies
        .list_companies(&admin, Some(CompanyStatus::Active))
        .await?;

    for company in &companies {
        if job == Job::GenerateInvoices && !company.is_billing_day(state.clock().today_in(company.timezone)) {
            report.skipped_companies += 1;
            debug!(job = job.name(), company_id = %company.id, billing_day = company.billing_day, "not a billing day");
            continue;
        }
        report.companies += 1;
        match run_for_company(state, job, company).await {
            Ok(processed) => report.processed += processed,
            Err(err) => {
                report.failed_companies += 1;
                error!(job = job.name(), company_id = %company.id, error = %err, "job failed for company");
            }
        }
    }

    info!(
        job = job.name(),
        companies = report.companies,
        skipped = report.skipped_companies,
        failed = report.failed_companies,
        processed = report.processed,
        "job finished"
    );
    Ok(report)
}

async fn run_for_company(state: &AppState, job: Job, company: &Company) -> Result<usize, JobError> {
    let ctx = TenantContext::tenant(company.id);
    let processed = match job {
        Job::GenerateInvoices => state.billing.generate_invoices_for_company(&ctx, company.id).await?,
        Job::ProcessExpirations => {
            state
                .billing
                .process_expirations_for_company(&ctx, company.id)
                .await?
                .expired
        }
        Job::CalculateCommissions { immediate } => state
            .ledger
            .payout_all(&ctx, company.id, immediate)
            .await?
            .iter()
            .filter(|s| s.commissions > 0)
            .count(),
        Job::SettleCommissions => state
            .ledger
            .settle_all(&ctx, company.id)
            .await?
            .iter()
            .filter(|s| s.commissions > 0)
            .count(),
        Job::SendNotifications => {
            let summary = state.notifications.send_expiry_notifications(&ctx, company.id).await?;
            summary.warnings_sent + summary.suspensions_sent
        }
        Job::RetryFailedSms { limit } => state.notifications.retry_failed(&ctx, limit).await?,
    };
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Job::parse(["billing:generate-invoices"]).unwrap(), Job::GenerateInvoices);
        assert_eq!(
            Job::parse(["reseller:calculate-commissions", "--immediate"]).unwrap(),
            Job::CalculateCommissions { immediate: true }
        );
        assert_eq!(
            Job::parse(["reseller:calculate-commissions"]).unwrap(),
            Job::CalculateCommissions { immediate: false }
        );
    }

    #[test]
    fn test_retry_limit_forms() {
        assert_eq!(
            Job::parse(["sms:retry-failed"]).unwrap(),
            Job::RetryFailedSms { limit: 10 }
        );
        assert_eq!(
            Job::parse(["sms:retry-failed", "--limit=25"]).unwrap(),
            Job::RetryFailedSms { limit: 25 }
        );
        assert_eq!(
            Job::parse(["sms:retry-failed", "--limit", "3"]).unwrap(),
            Job::RetryFailedSms { limit: 3 }
        );
        assert!(matches!(
            Job::parse(["sms:retry-failed", "--limit=many"]),
            Err(JobError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(Job::parse(["billing:oops"]), Err(JobError::UnknownCommand(_))));
        assert!(matches!(Job::parse(Vec::<String>::new()), Err(JobError::InvalidArgument(_))));
    }

    #[test]
    fn test_name_round_trips() {
        for job in [
            Job::GenerateInvoices,
            Job::ProcessExpirations,
            Job::SettleCommissions,
            Job::SendNotifications,
        ] {
            assert_eq!(Job::parse([job.name()]).unwrap(), job);
        }
    }
}
