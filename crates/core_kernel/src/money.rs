//! Decimal money helpers
//!
//! Every stored amount in the platform (prices, VAT, invoice totals, balances,
//! commissions) is a `rust_decimal::Decimal` with two decimal places. Floating
//! point never touches a monetary value, so repeated small ledger movements do
//! not drift.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use thiserror::Error;

/// Number of decimal places carried by every stored amount
pub const MONEY_DP: u32 = 2;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be greater than zero, got {0}")]
    NonPositive(Decimal),

    #[error("Percentage out of range: {0}")]
    InvalidPercent(Decimal),

    #[error("Overflow during calculation")]
    Overflow,
}

/// Rounds an amount to the stored precision (2 dp, midpoint away from zero)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes `base * percent / 100`, rounded to the stored precision
///
/// Used for VAT and reseller commission. Percentages outside 0..=100 are
/// rejected rather than silently producing negative or inflated amounts.
///
/// # Example
///
/// ```rust
/// use core_kernel::percent_of;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(percent_of(dec!(100.00), dec!(15)).unwrap(), dec!(15.00));
/// ```
pub fn percent_of(base: Decimal, percent: Decimal) -> Result<Decimal, MoneyError> {
    if percent < Decimal::ZERO || percent > dec!(100) {
        return Err(MoneyError::InvalidPercent(percent));
    }

    let product = base.checked_mul(percent).ok_or(MoneyError::Overflow)?;
    let share = product.checked_div(dec!(100)).ok_or(MoneyError::Overflow)?;
    Ok(round_money(share))
}

/// Validates that an amount is strictly positive and normalises it to 2 dp
pub fn ensure_positive(amount: Decimal) -> Result<Decimal, MoneyError> {
    let rounded = round_money(amount);
    if rounded <= Decimal::ZERO {
        return Err(MoneyError::NonPositive(amount));
    }
    Ok(rounded)
}

/// Checked addition at stored precision
pub fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_add(b).map(round_money).ok_or(MoneyError::Overflow)
}

/// Checked subtraction at stored precision
pub fn checked_sub(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_sub(b).map(round_money).ok_or(MoneyError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
    }

    #[test]
    fn test_percent_of_vat() {
        assert_eq!(percent_of(dec!(100.00), dec!(5)).unwrap(), dec!(5.00));
        assert_eq!(percent_of(dec!(999.99), dec!(7.5)).unwrap(), dec!(75.00));
    }

    #[test]
    fn test_percent_out_of_range() {
        assert_eq!(
            percent_of(dec!(100), dec!(101)),
            Err(MoneyError::InvalidPercent(dec!(101)))
        );
        assert!(percent_of(dec!(100), dec!(-1)).is_err());
    }

    #[test]
    fn test_ensure_positive() {
        assert_eq!(ensure_positive(dec!(10.456)).unwrap(), dec!(10.46));
        assert!(ensure_positive(dec!(0)).is_err());
        assert!(ensure_positive(dec!(0.001)).is_err());
    }

    #[test]
    fn test_small_movements_do_not_drift() {
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total = checked_add(total, dec!(0.10)).unwrap();
        }
        assert_eq!(total, dec!(100.00));
    }
}
