//! PostgreSQL adapters against a real database
//!
//! Need docker; run with `cargo test -p test_utils -- --ignored`.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;

use core_kernel::{PortError, SystemClock, TenancyError, TenantContext};
use domain_billing::{
    BillingEngine, BillingStore, CustomerService, InvoiceStatus, NewPayment, Payment, PaymentMethod, PaymentRecord,
};
use domain_integrations::DisabledRouterConnector;
use domain_reseller::{LedgerError, LedgerService, RechargeRecord};
use domain_support::{NewTicket, SupportError, SupportService, TicketAction, TicketStatus};
use domain_tenancy::CompanyDirectory;
use infra_db::{
    JobLock, PostgresBillingStore, PostgresCompanyDirectory, PostgresLedgerStore, PostgresTicketStore,
};
use test_utils::{db_test, CompanyFixtures, CustomerBuilder, PackageBuilder, PrincipalFixtures};

db_test!(test_company_resolves_by_subdomain, |pool| {
    let directory = PostgresCompanyDirectory::new(pool.clone());
    let alpha = CompanyFixtures::alpha();
    directory.insert_company(&alpha).await.unwrap();

    let found = directory.find_by_host("alpha.isp.test", Some("alpha")).await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(alpha.id));
    assert!(directory.host_key_taken("alpha", None).await.unwrap());
    assert!(!directory.host_key_taken("alpha", Some(alpha.id)).await.unwrap());
});

db_test!(test_customer_rows_are_stamped_and_isolated, |pool| {
    let directory = Arc::new(PostgresCompanyDirectory::new(pool.clone()));
    let store = Arc::new(PostgresBillingStore::new(pool.clone()));
    let alpha = CompanyFixtures::alpha();
    let beta = CompanyFixtures::beta();
    directory.insert_company(&alpha).await.unwrap();
    directory.insert_company(&beta).await.unwrap();

    let alpha_ctx = TenantContext::tenant(alpha.id);
    let package = store
        .insert_package(&alpha_ctx, &PackageBuilder::new(alpha.id).build())
        .await
        .unwrap();

    // Requested owner is beta; the active tenant wins
    let stored = store
        .insert_customer(&alpha_ctx, &CustomerBuilder::new(beta.id).package(&package).build())
        .await
        .unwrap();
    assert_eq!(stored.company_id, alpha.id);

    let beta_ctx = TenantContext::tenant(beta.id);
    assert!(matches!(
        store.get_customer(&beta_ctx, stored.id).await,
        Err(PortError::NotFound { .. })
    ));
    assert!(matches!(
        store.update_customer(&beta_ctx, &stored).await,
        Err(PortError::Tenancy(TenancyError::CrossTenantViolation { .. })) | Err(PortError::NotFound { .. })
    ));

    let service = CustomerService::new(store, directory, Arc::new(core_kernel::SystemClock));
    let listed = service
        .list_customers(&TenantContext::super_admin(), &Default::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
});

db_test!(test_ledger_transfer_is_atomic, |pool| {
    let directory = PostgresCompanyDirectory::new(pool.clone());
    let alpha = CompanyFixtures::alpha();
    directory.insert_company(&alpha).await.unwrap();

    let ledger = LedgerService::new(
        Arc::new(PostgresLedgerStore::new(pool.clone())),
        Arc::new(core_kernel::SystemClock),
    );
    let ctx = TenantContext::tenant(alpha.id);
    let admin = PrincipalFixtures::admin(alpha.id);
    let reseller = PrincipalFixtures::reseller(alpha.id);
    let employee = PrincipalFixtures::employee(alpha.id);

    ledger
        .add_reseller_balance(&ctx, alpha.id, reseller.user_id, dec!(100), admin.user_id, None)
        .await
        .unwrap();
    assert!(ledger
        .transfer_to_employee(&ctx, alpha.id, reseller.user_id, employee.user_id, dec!(150), None)
        .await
        .is_err());
    let (from, to) = ledger
        .transfer_to_employee(&ctx, alpha.id, reseller.user_id, employee.user_id, dec!(40), None)
        .await
        .unwrap();
    assert_eq!(from.balance, dec!(60));
    assert_eq!(to.balance, dec!(40));

    let history = ledger.transfer_history(&ctx, reseller.user_id, None).await.unwrap();
    assert_eq!(history.len(), 2);
});

db_test!(test_job_lock_is_exclusive, |pool| {
    let first = JobLock::try_acquire(&pool, "billing:generate-invoices").await.unwrap();
    assert!(first.is_some());
    assert!(JobLock::try_acquire(&pool, "billing:generate-invoices").await.unwrap().is_none());
    assert!(JobLock::try_acquire(&pool, "sms:retry-failed").await.unwrap().is_some());

    first.unwrap().release().await.unwrap();
    assert!(JobLock::try_acquire(&pool, "billing:generate-invoices").await.unwrap().is_some());
});

db_test!(test_concurrent_invoice_payments_reconcile, |pool| {
    let directory = Arc::new(PostgresCompanyDirectory::new(pool.clone()));
    let store = Arc::new(PostgresBillingStore::new(pool.clone()));
    let alpha = CompanyFixtures::alpha();
    directory.insert_company(&alpha).await.unwrap();

    let ctx = TenantContext::tenant(alpha.id);
    let package = store
        .insert_package(&ctx, &PackageBuilder::new(alpha.id).price(dec!(1000)).vat_percent(dec!(0)).build())
        .await
        .unwrap();
    let customer = store
        .insert_customer(&ctx, &CustomerBuilder::new(alpha.id).package(&package).build())
        .await
        .unwrap();

    let engine = BillingEngine::new(
        store.clone(),
        directory,
        Arc::new(DisabledRouterConnector),
        Arc::new(SystemClock),
    );
    let invoice = engine
        .generate_invoice_for_customer(&ctx, customer.id)
        .await
        .unwrap()
        .unwrap();

    let half = || NewPayment::new(customer.id, dec!(500), PaymentMethod::Receive).for_invoice(invoice.id);
    let (a, b) = tokio::join!(engine.process_payment(&ctx, half()), engine.process_payment(&ctx, half()));
    a.unwrap();
    b.unwrap();

    let stored = store.get_invoice(&ctx, invoice.id).await.unwrap();
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert!(stored.payment_date.is_some());
});

db_test!(test_recharge_commits_or_writes_nothing, |pool| {
    let directory = PostgresCompanyDirectory::new(pool.clone());
    let store = PostgresBillingStore::new(pool.clone());
    let alpha = CompanyFixtures::alpha();
    directory.insert_company(&alpha).await.unwrap();

    let ctx = TenantContext::tenant(alpha.id);
    let expiry = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let package = store
        .insert_package(&ctx, &PackageBuilder::new(alpha.id).price(dec!(1000)).build())
        .await
        .unwrap();
    let customer = store
        .insert_customer(&ctx, &CustomerBuilder::new(alpha.id).package(&package).expiry(expiry).build())
        .await
        .unwrap();

    let ledger = LedgerService::new(Arc::new(PostgresLedgerStore::new(pool.clone())), Arc::new(SystemClock));
    let admin = PrincipalFixtures::admin(alpha.id);
    let reseller = PrincipalFixtures::reseller(alpha.id);
    ledger
        .add_reseller_balance(&ctx, alpha.id, reseller.user_id, dec!(2000), admin.user_id, None)
        .await
        .unwrap();

    let record = |previous_expiry: Option<NaiveDate>| RechargeRecord {
        debit: ledger
            .recharge_debit(&ctx, alpha.id, &reseller, dec!(1050), None)
            .unwrap(),
        payment: PaymentRecord {
            payment: Payment::record(
                alpha.id,
                NewPayment::new(customer.id, dec!(1050), PaymentMethod::Receive).by_operator(reseller.user_id),
                Utc::now(),
            ),
            commission: None,
        },
        customer_id: customer.id,
        previous_expiry,
        new_expiry: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
    };

    // The debit is applied first in the transaction; the stale expiry undoes it
    let err = ledger
        .apply_recharge(&ctx, record(NaiveDate::from_ymd_opt(2025, 2, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Port(PortError::Conflict { .. })));
    assert!(store.list_payments(&ctx, Some(customer.id)).await.unwrap().is_empty());
    let balance = ledger.get_reseller_balance(&ctx, alpha.id, reseller.user_id).await.unwrap();
    assert_eq!(balance.balance, dec!(2000));
    assert_eq!(ledger.transfer_history(&ctx, reseller.user_id, None).await.unwrap().len(), 1);

    let (balance, payment) = ledger.apply_recharge(&ctx, record(Some(expiry))).await.unwrap();
    assert_eq!(balance.unwrap().balance, dec!(950));
    assert_eq!(payment.amount, dec!(1050));
    assert_eq!(store.list_payments(&ctx, Some(customer.id)).await.unwrap().len(), 1);
    assert_eq!(
        store.get_customer(&ctx, customer.id).await.unwrap().expiry_date,
        NaiveDate::from_ymd_opt(2025, 4, 1)
    );
    assert_eq!(ledger.transfer_history(&ctx, reseller.user_id, None).await.unwrap().len(), 2);
});

db_test!(test_ticket_workflow_is_logged_and_isolated, |pool| {
    let directory = PostgresCompanyDirectory::new(pool.clone());
    let alpha = CompanyFixtures::alpha();
    let beta = CompanyFixtures::beta();
    directory.insert_company(&alpha).await.unwrap();
    directory.insert_company(&beta).await.unwrap();

    let support = SupportService::new(
        Arc::new(PostgresTicketStore::new(pool.clone())),
        Arc::new(PostgresBillingStore::new(pool.clone())),
        Arc::new(SystemClock),
    );
    let ctx = TenantContext::tenant(alpha.id);
    let agent = PrincipalFixtures::operator(alpha.id).user_id;

    let ticket = support
        .open_ticket(&ctx, alpha.id, agent, NewTicket::new("No internet", "ONU shows LOS"))
        .await
        .unwrap();
    support
        .change_status(&ctx, agent, ticket.id, TicketStatus::InProgress)
        .await
        .unwrap();
    support.add_comment(&ctx, agent, ticket.id, "Fibre cut at pole 12").await.unwrap();
    support.close_ticket(&ctx, agent, ticket.id).await.unwrap();

    // Forbidden move leaves the row and the log as they were
    assert!(matches!(
        support.change_status(&ctx, agent, ticket.id, TicketStatus::Resolved).await,
        Err(SupportError::InvalidTransition { .. })
    ));
    let actions: Vec<_> = support
        .ticket_logs(&ctx, ticket.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            TicketAction::Created,
            TicketAction::StatusChanged,
            TicketAction::CommentAdded,
            TicketAction::Closed
        ]
    );

    let beta_ctx = TenantContext::tenant(beta.id);
    assert!(matches!(
        support.get_ticket(&beta_ctx, ticket.id).await,
        Err(SupportError::NotFound(_))
    ));
    assert!(matches!(
        support.reopen_ticket(&beta_ctx, agent, ticket.id).await,
        Err(SupportError::NotFound(_))
    ));
    assert_eq!(support.ticket_stats(&ctx).await.unwrap().closed, 1);
});
