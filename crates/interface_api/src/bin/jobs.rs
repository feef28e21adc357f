//! Scheduled job runner
//!
//! ```bash
//! isp-billing-jobs billing:generate-invoices
//! isp-billing-jobs reseller:calculate-commissions --immediate
//! isp-billing-jobs sms:retry-failed --limit=25
//! ```
//!
//! Each command holds a named run-lock; a second copy started while one is
//! running exits successfully without doing anything.

use domain_integrations::GatewayRegistry;
use infra_db::JobLock;
use interface_api::jobs::{self, Job};
use interface_api::startup::{connect_database, init_tracing, load_config};
use interface_api::{AppState, Ports};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level);

    let job = Job::parse(std::env::args().skip(1))?;
    let pool = connect_database(&config, "isp-billing-jobs").await?;

    let Some(lock) = JobLock::try_acquire(&pool, job.name()).await? else {
        tracing::info!(job = job.name(), "already running elsewhere, skipping");
        return Ok(());
    };

    let ports = Ports::postgres(pool, &config)?;
    let state = AppState::new(config, ports, GatewayRegistry::new());
    let result = jobs::run(&state, job).await;

    lock.release().await?;
    let report = result?;
    if report.failed_companies > 0 {
        anyhow::bail!("{} of {} companies failed", report.failed_companies, report.companies);
    }
    Ok(())
}
