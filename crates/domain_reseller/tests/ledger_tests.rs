//! Balance invariants

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CompanyId, UserId};
use domain_reseller::{FundTransfer, LedgerError, Principal, ResellerBalance, Role, TransferType};

#[derive(Debug, Clone)]
enum Op {
    Credit(i64),
    Debit(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..50_000).prop_map(Op::Credit),
        (1i64..50_000).prop_map(Op::Debit),
    ]
}

proptest! {
    #[test]
    fn prop_balance_never_negative(ops in prop::collection::vec(op(), 1..60)) {
        let mut balance = ResellerBalance::open(CompanyId::new(), UserId::new());
        let mut expected = Decimal::ZERO;

        for op in ops {
            match op {
                Op::Credit(cents) => {
                    let amount = Decimal::new(cents, 2);
                    balance.credit(amount).unwrap();
                    expected += amount;
                }
                Op::Debit(cents) => {
                    let amount = Decimal::new(cents, 2);
                    let before = balance.balance;
                    match balance.debit(amount) {
                        Ok(_) => expected -= amount,
                        Err(LedgerError::InsufficientBalance { .. }) => {
                            prop_assert_eq!(balance.balance, before);
                        }
                        Err(other) => prop_assert!(false, "unexpected error {other}"),
                    }
                }
            }
            prop_assert!(balance.balance >= Decimal::ZERO);
            prop_assert_eq!(balance.balance, expected);
        }
    }
}

#[test]
fn test_transfer_type_strings() {
    for t in [
        TransferType::FromAdminToReseller,
        TransferType::ResellerToEmployee,
        TransferType::ResellerCommissionPayouts,
        TransferType::ResellerRecharge,
        TransferType::EmployeeRecharge,
    ] {
        assert_eq!(t.as_str().parse::<TransferType>().unwrap(), t);
    }
}

#[test]
fn test_recharge_transfer_type_by_role() {
    let user = UserId::new();
    assert_eq!(
        Principal::new(user, None, Role::Reseller).recharge_transfer_type(),
        Some(TransferType::ResellerRecharge)
    );
    assert_eq!(
        Principal::new(user, None, Role::ResellerEmployee).recharge_transfer_type(),
        Some(TransferType::EmployeeRecharge)
    );
    assert_eq!(Principal::new(user, None, Role::Admin).recharge_transfer_type(), None);
}

#[test]
fn test_payout_transfer_credits_reseller() {
    let reseller = UserId::new();
    let t = FundTransfer::commission_payout(CompanyId::new(), reseller, dec!(150), 2);
    assert_eq!(t.to_user_id, Some(reseller));
    assert_eq!(t.from_user_id, None);
    assert!(t.involves(reseller));
}
