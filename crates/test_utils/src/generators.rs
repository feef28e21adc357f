//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, rates and dates that respect the
//! billing rules: two-decimal money, billing days 1 to 28, VAT 0 to 100.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_billing::{CustomerType, PaymentType};

use crate::fixtures::TemporalFixtures;

/// Positive money amounts with two decimal places, 0.01 to 1,000,000.00
pub fn money_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|minor| Decimal::new(minor, 2))
}

/// Zero and negative amounts, which every money operation must reject
pub fn non_positive_money_strategy() -> impl Strategy<Value = Decimal> {
    (-100_000_000i64..=0i64).prop_map(|minor| Decimal::new(minor, 2))
}

/// Percentages with two decimal places, 0.00 to 100.00
pub fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
}

pub fn billing_day_strategy() -> impl Strategy<Value = u8> {
    1u8..=28u8
}

/// Dates within two years either side of the fixture "today"
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (-730i64..=730i64).prop_map(|offset| TemporalFixtures::today() + Duration::days(offset))
}

pub fn payment_type_strategy() -> impl Strategy<Value = PaymentType> {
    prop_oneof![Just(PaymentType::Receive), Just(PaymentType::Due)]
}

pub fn customer_type_strategy() -> impl Strategy<Value = CustomerType> {
    prop_oneof![
        Just(CustomerType::Home),
        Just(CustomerType::Free),
        Just(CustomerType::Vip),
        Just(CustomerType::Corporate),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_money_is_positive_with_two_places(amount in money_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert!(amount.scale() == 2);
        }

        #[test]
        fn test_percent_in_range(p in percent_strategy()) {
            prop_assert!(p >= Decimal::ZERO && p <= Decimal::ONE_HUNDRED);
        }
    }
}
