//! Scheduled sweeps across companies

mod common;

use chrono::Datelike;
use rust_decimal_macros::dec;

use core_kernel::TenantContext;
use domain_billing::CustomerStatus;
use domain_tenancy::{Company, CompanyStatus};
use interface_api::jobs::{self, Job};
use test_utils::{CompanyFixtures, CustomerBuilder, PackageBuilder, PrincipalFixtures, TemporalFixtures};

use common::spawn;

/// A fixture company whose billing day is the fixed clock's today
fn billing_today(mut company: Company) -> Company {
    company.billing_day = TemporalFixtures::today().day() as u8;
    company
}

#[tokio::test]
async fn test_invoice_job_visits_only_active_companies() {
    let alpha = billing_today(CompanyFixtures::alpha());
    let beta = billing_today(CompanyFixtures::beta());
    let mut dormant = billing_today(CompanyFixtures::with_subdomain("Dormant", "dormant"));
    dormant.status = CompanyStatus::Suspended;
    let app = spawn(vec![alpha.clone(), beta.clone(), dormant.clone()]).await;

    for company in [&alpha, &beta, &dormant] {
        let package = PackageBuilder::new(company.id).build();
        app.platform.seed_package(&package).await;
        app.platform
            .seed_customer(&CustomerBuilder::new(company.id).package(&package).build())
            .await;
    }

    let report = jobs::run(&app.state, Job::GenerateInvoices).await.unwrap();
    assert_eq!(report.companies, 2);
    assert_eq!(report.skipped_companies, 0);
    assert_eq!(report.failed_companies, 0);
    assert_eq!(report.processed, 2);

    let invoiced: Vec<_> = app
        .platform
        .billing
        .invoices
        .read()
        .await
        .values()
        .map(|i| i.company_id)
        .collect();
    assert!(!invoiced.contains(&dormant.id));
}

#[tokio::test]
async fn test_invoice_job_waits_for_billing_day() {
    // Fixture companies bill on the 10th; the clock reads the 15th
    let due = billing_today(CompanyFixtures::alpha());
    let not_due = CompanyFixtures::beta();
    assert_ne!(u32::from(not_due.billing_day), TemporalFixtures::today().day());
    let app = spawn(vec![due.clone(), not_due.clone()]).await;

    for company in [&due, &not_due] {
        let package = PackageBuilder::new(company.id).build();
        app.platform.seed_package(&package).await;
        app.platform
            .seed_customer(&CustomerBuilder::new(company.id).package(&package).build())
            .await;
    }

    let report = jobs::run(&app.state, Job::GenerateInvoices).await.unwrap();
    assert_eq!(report.companies, 1);
    assert_eq!(report.skipped_companies, 1);
    assert_eq!(report.processed, 1);

    let invoices = app.platform.billing.invoices.read().await;
    assert_eq!(invoices.values().filter(|i| i.company_id == not_due.id).count(), 0);
    assert_eq!(invoices.values().filter(|i| i.company_id == due.id).count(), 1);
}

#[tokio::test]
async fn test_expiration_job_expires_per_company() {
    let alpha = billing_today(CompanyFixtures::alpha());
    let beta = billing_today(CompanyFixtures::beta());
    let app = spawn(vec![alpha.clone(), beta.clone()]).await;

    let mut lapsed = Vec::new();
    for company in [&alpha, &beta] {
        let package = PackageBuilder::new(company.id).build();
        app.platform.seed_package(&package).await;
        let customer = CustomerBuilder::new(company.id)
            .package(&package)
            .expiry(TemporalFixtures::date(2025, 1, 1))
            .build();
        app.platform.seed_customer(&customer).await;
        lapsed.push(customer);
    }

    // Unpaid invoices make the lapsed customers eligible
    jobs::run(&app.state, Job::GenerateInvoices).await.unwrap();
    let report = jobs::run(&app.state, Job::ProcessExpirations).await.unwrap();
    assert_eq!(report.processed, 2);

    for customer in lapsed {
        let stored = app.platform.billing.raw_customer(customer.id).await.unwrap();
        assert_eq!(stored.status, CustomerStatus::Expired);
    }
}

#[tokio::test]
async fn test_deferred_commissions_then_settlement() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;
    let ctx = TenantContext::tenant(alpha.id);
    let reseller = PrincipalFixtures::reseller(alpha.id);

    let package = PackageBuilder::new(alpha.id).price(dec!(1000)).build();
    app.platform.seed_package(&package).await;
    let customer = CustomerBuilder::new(alpha.id)
        .package(&package)
        .reseller(reseller.user_id)
        .build();
    app.platform.seed_customer(&customer).await;
    app.state
        .customers
        .set_commission_percent(&ctx, alpha.id, reseller.user_id, Some(dec!(5)))
        .await
        .unwrap();
    app.state
        .billing
        .calculate_and_record_commission(&ctx, customer.id, dec!(1050))
        .await
        .unwrap();

    let deferred = jobs::run(&app.state, Job::CalculateCommissions { immediate: false })
        .await
        .unwrap();
    assert_eq!(deferred.processed, 1);
    let balance = app.state.ledger.get_reseller_balance(&ctx, alpha.id, reseller.user_id).await.unwrap();
    assert_eq!(balance.balance, dec!(0));

    let settled = jobs::run(&app.state, Job::SettleCommissions).await.unwrap();
    assert_eq!(settled.processed, 1);
    let balance = app.state.ledger.get_reseller_balance(&ctx, alpha.id, reseller.user_id).await.unwrap();
    assert_eq!(balance.balance, dec!(50));
}

#[tokio::test]
async fn test_retry_job_spans_companies() {
    let alpha = CompanyFixtures::alpha();
    let beta = CompanyFixtures::beta();
    let app = spawn(vec![alpha.clone(), beta.clone()]).await;

    app.platform.sms_sender.set_failing(true);
    for company in [&alpha, &beta] {
        let ctx = TenantContext::tenant(company.id);
        let dispatcher = domain_integrations::SmsDispatcher::new(
            app.platform.sms_sender.clone(),
            app.platform.sms_store.clone(),
        );
        assert!(!dispatcher.send(&ctx, company.id, "01710000001", "hello").await.unwrap());
    }
    app.platform.sms_sender.set_failing(false);

    let report = jobs::run(&app.state, Job::RetryFailedSms { limit: 1 }).await.unwrap();
    assert_eq!(report.processed, 1);
    let report = jobs::run(&app.state, Job::RetryFailedSms { limit: 10 }).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(app.platform.sms_sender.sent().await.len(), 2);
}
