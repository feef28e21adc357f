//! Customer recharge
//!
//! A recharge extends a customer's service by one month. The amount is the
//! package price plus VAT. Resellers and reseller employees pay for it from
//! their own balance; other staff recharge without a balance check.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use core_kernel::{CustomerId, TenantContext};
use domain_billing::{BillingEngine, BillingError, BillingStore, NewPayment, Payment, PaymentType};

use crate::balance::ResellerBalance;
use crate::error::LedgerError;
use crate::ledger::LedgerService;
use crate::ports::RechargeRecord;
use crate::principal::Principal;

#[derive(Debug, Clone, Serialize)]
pub struct RechargeOutcome {
    pub amount: Decimal,
    pub payment: Payment,
    pub expiry_date: NaiveDate,
    /// The principal's balance after the debit, if they hold one
    pub balance: Option<ResellerBalance>,
}

#[derive(Clone)]
pub struct RechargeService {
    ledger: LedgerService,
    billing: BillingEngine,
}

impl RechargeService {
    pub fn new(ledger: LedgerService, billing: BillingEngine) -> Self {
        Self { ledger, billing }
    }

    /// Recharges a customer on behalf of `principal`
    ///
    /// Price, new expiry, payment and debit are all worked out first; the
    /// debit, payment, commission, expiry update and transfer row are then
    /// written in a single store transaction. A failure anywhere leaves no
    /// trace.
    ///
    /// # Errors
    ///
    /// * `InsufficientBalance` - the principal's balance does not cover the amount
    /// * `Billing` - the customer has no package, or the expiry cannot be extended
    /// * `Port(Conflict)` - the customer's expiry changed while recharging
    pub async fn recharge_customer(
        &self,
        ctx: &TenantContext,
        principal: &Principal,
        customer_id: CustomerId,
        payment_type: PaymentType,
    ) -> Result<RechargeOutcome, LedgerError> {
        let customer = self.billing.store().get_customer(ctx, customer_id).await.map_err(BillingError::from)?;
        let pricing = self.billing.cycle_price(ctx, &customer).await?;
        let amount = pricing.total_amount;
        let company_id = customer.company_id;

        if !self
            .ledger
            .validate_balance_for_recharge(ctx, company_id, principal, amount)
            .await?
        {
            let available = self
                .ledger
                .get_reseller_balance(ctx, company_id, principal.user_id)
                .await?
                .balance;
            info!(user_id = %principal.user_id, available = %available, requested = %amount, "recharge declined");
            return Err(LedgerError::InsufficientBalance {
                user_id: principal.user_id,
                available,
                requested: amount,
            });
        }

        let new_expiry = self.billing.next_expiry_for(ctx, &customer).await?;
        let payment = self
            .billing
            .prepare_payment(
                ctx,
                NewPayment::new(customer_id, amount, payment_type.into()).by_operator(principal.user_id),
            )
            .await?;
        let debit = self.ledger.recharge_debit(
            ctx,
            company_id,
            principal,
            amount,
            Some(format!("Recharge {}", customer.username)),
        )?;

        let record = RechargeRecord {
            debit,
            payment,
            customer_id,
            previous_expiry: customer.expiry_date,
            new_expiry,
        };
        let (balance, payment) = self.ledger.apply_recharge(ctx, record).await?;

        info!(
            customer_id = %customer_id,
            user_id = %principal.user_id,
            role = principal.role.as_str(),
            payment_type = payment_type.as_str(),
            amount = %amount,
            previous = ?customer.expiry_date,
            expiry = %new_expiry,
            "customer recharged"
        );
        Ok(RechargeOutcome {
            amount,
            payment,
            expiry_date: new_expiry,
            balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use core_kernel::{CompanyId, FixedClock, UserId};
    use domain_billing::{Customer, MockBillingStore, NewCustomer, NewPackage, Package, PaymentMethod};
    use domain_integrations::router::mock::MockRouterConnector;
    use domain_tenancy::{Company, MockCompanyDirectory, NewCompany, TenancyConfig};
    use rust_decimal_macros::dec;

    use crate::ports::mock::MockLedgerStore;
    use crate::principal::Role;

    struct Fixture {
        recharge: RechargeService,
        ledger: LedgerService,
        store: MockLedgerStore,
        billing: MockBillingStore,
        ctx: TenantContext,
        company: CompanyId,
        customer: CustomerId,
    }

    async fn fixture() -> Fixture {
        let mut company = Company::from_request(
            NewCompany {
                name: "Alpha Net".to_string(),
                subdomain: Some("alpha".to_string()),
                ..Default::default()
            },
            &TenancyConfig::default().company_defaults(),
        );
        company.vat_percent = dec!(5);
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let clock = Arc::new(FixedClock::at_date(today));

        let billing = MockBillingStore::new();
        let package = Package::from_request(
            company.id,
            NewPackage {
                name: "Home 10M".to_string(),
                price: dec!(1000),
                ..Default::default()
            },
        );
        billing.seed_package(package.clone()).await;
        let mut customer = Customer::from_request(
            company.id,
            NewCustomer {
                name: "Rahim".to_string(),
                phone: "01711000000".to_string(),
                username: "rahim".to_string(),
                password: "secret1".to_string(),
                package_id: Some(package.id),
                ..Default::default()
            },
            today,
        );
        customer.expiry_date = NaiveDate::from_ymd_opt(2025, 3, 1);
        billing.seed_customer(customer.clone()).await;

        let engine = BillingEngine::new(
            Arc::new(billing.clone()),
            Arc::new(MockCompanyDirectory::with_companies(vec![company.clone()]).await),
            Arc::new(MockRouterConnector::new()),
            clock.clone(),
        );
        let store = MockLedgerStore::with_billing(&billing);
        let ledger = LedgerService::new(Arc::new(store.clone()), clock);
        Fixture {
            recharge: RechargeService::new(ledger.clone(), engine),
            ledger,
            store,
            billing,
            ctx: TenantContext::tenant(company.id),
            company: company.id,
            customer: customer.id,
        }
    }

    #[tokio::test]
    async fn test_reseller_recharge_debits_price_plus_vat() {
        let f = fixture().await;
        let reseller = Principal::new(UserId::new(), Some(f.company), Role::Reseller);
        f.ledger
            .add_reseller_balance(&f.ctx, f.company, reseller.user_id, dec!(2000), UserId::new(), None)
            .await
            .unwrap();

        let outcome = f
            .recharge
            .recharge_customer(&f.ctx, &reseller, f.customer, PaymentType::Receive)
            .await
            .unwrap();

        assert_eq!(outcome.amount, dec!(1050.00));
        assert_eq!(outcome.balance.unwrap().balance, dec!(950.00));
        assert_eq!(outcome.payment.payment_method, PaymentMethod::Receive);
        assert_eq!(outcome.payment.operator_id, Some(reseller.user_id));
        assert_eq!(outcome.expiry_date, NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
    }

    #[tokio::test]
    async fn test_short_balance_blocks_recharge() {
        let f = fixture().await;
        let reseller = Principal::new(UserId::new(), Some(f.company), Role::Reseller);

        let err = f
            .recharge
            .recharge_customer(&f.ctx, &reseller, f.customer, PaymentType::Due)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert!(f.billing.payments.read().await.is_empty());
        assert_eq!(
            f.billing.raw_customer(f.customer).await.unwrap().expiry_date,
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[tokio::test]
    async fn test_operator_recharge_without_balance() {
        let f = fixture().await;
        let operator = Principal::new(UserId::new(), Some(f.company), Role::Operator);

        let outcome = f
            .recharge
            .recharge_customer(&f.ctx, &operator, f.customer, PaymentType::Due)
            .await
            .unwrap();
        assert!(outcome.balance.is_none());
        assert_eq!(outcome.payment.payment_method, PaymentMethod::Due);
    }

    #[tokio::test]
    async fn test_failed_recharge_leaves_no_trace() {
        let f = fixture().await;
        let reseller = Principal::new(UserId::new(), Some(f.company), Role::Reseller);
        f.ledger
            .add_reseller_balance(&f.ctx, f.company, reseller.user_id, dec!(2000), UserId::new(), None)
            .await
            .unwrap();

        // No later month exists, so the extension cannot be computed
        let mut customer = f.billing.raw_customer(f.customer).await.unwrap();
        customer.expiry_date = Some(NaiveDate::MAX);
        f.billing.seed_customer(customer).await;

        let err = f
            .recharge
            .recharge_customer(&f.ctx, &reseller, f.customer, PaymentType::Receive)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Billing(BillingError::Calculation(_))));

        assert!(f.billing.payments.read().await.is_empty());
        let balance = f.ledger.get_reseller_balance(&f.ctx, f.company, reseller.user_id).await.unwrap();
        assert_eq!(balance.balance, dec!(2000));
        // Only the funding transfer
        assert_eq!(f.store.transfers().await.len(), 1);
        assert_eq!(
            f.billing.raw_customer(f.customer).await.unwrap().expiry_date,
            Some(NaiveDate::MAX)
        );
    }

    #[tokio::test]
    async fn test_stale_expiry_rejects_whole_recharge() {
        let f = fixture().await;
        let reseller = Principal::new(UserId::new(), Some(f.company), Role::Reseller);
        f.ledger
            .add_reseller_balance(&f.ctx, f.company, reseller.user_id, dec!(2000), UserId::new(), None)
            .await
            .unwrap();

        let payment = f
            .recharge
            .billing
            .prepare_payment(&f.ctx, NewPayment::new(f.customer, dec!(1050), PaymentMethod::Receive))
            .await
            .unwrap();
        let debit = f
            .ledger
            .recharge_debit(&f.ctx, f.company, &reseller, dec!(1050), None)
            .unwrap();
        let record = RechargeRecord {
            debit,
            payment,
            customer_id: f.customer,
            // Another recharge already moved the expiry past this
            previous_expiry: NaiveDate::from_ymd_opt(2025, 2, 1),
            new_expiry: NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(),
        };

        let err = f.ledger.apply_recharge(&f.ctx, record).await.unwrap_err();
        assert!(matches!(err, LedgerError::Port(core_kernel::PortError::Conflict { .. })));
        assert!(f.billing.payments.read().await.is_empty());
        assert_eq!(f.store.transfers().await.len(), 1);
        let balance = f.ledger.get_reseller_balance(&f.ctx, f.company, reseller.user_id).await.unwrap();
        assert_eq!(balance.balance, dec!(2000));
        assert_eq!(
            f.billing.raw_customer(f.customer).await.unwrap().expiry_date,
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[tokio::test]
    async fn test_recharge_writes_one_transfer() {
        let f = fixture().await;
        let employee = Principal::new(UserId::new(), Some(f.company), Role::ResellerEmployee);
        f.ledger
            .add_balance(
                &f.ctx,
                f.company,
                employee.user_id,
                dec!(1050),
                crate::transfer::TransferType::ResellerToEmployee,
                None,
                None,
            )
            .await
            .unwrap();

        let outcome = f
            .recharge
            .recharge_customer(&f.ctx, &employee, f.customer, PaymentType::Receive)
            .await
            .unwrap();
        assert_eq!(outcome.balance.unwrap().balance, dec!(0));

        let transfers = f.store.transfers().await;
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[1].transfer_type, crate::transfer::TransferType::EmployeeRecharge);
        assert_eq!(transfers[1].from_user_id, Some(employee.user_id));
        assert_eq!(f.billing.payments.read().await.len(), 1);
        assert_eq!(
            f.billing.raw_customer(f.customer).await.unwrap().expiry_date,
            NaiveDate::from_ymd_opt(2025, 4, 10)
        );
    }
}
