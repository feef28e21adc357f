//! Service-period arithmetic

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{add_months_clamped, TemporalError};

use crate::customer::string_enum;
use crate::payment::PaymentMethod;

/// How an extension was paid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Receive,
    Due,
}

string_enum!(PaymentType {
    Receive => "receive",
    Due => "due",
});

impl From<PaymentType> for PaymentMethod {
    fn from(value: PaymentType) -> Self {
        match value {
            PaymentType::Receive => PaymentMethod::Receive,
            PaymentType::Due => PaymentMethod::Due,
        }
    }
}

/// True when the service period has lapsed; no expiry at all counts as lapsed
pub fn is_past(expiry: Option<NaiveDate>, today: NaiveDate) -> bool {
    expiry.map_or(true, |e| e < today)
}

/// Expiry after one more month of service
///
/// A lapsed period restarts from today; a running one is extended from its
/// current end. The day of month clamps to the end of the target month.
pub fn next_expiry(expiry: Option<NaiveDate>, today: NaiveDate) -> Result<NaiveDate, TemporalError> {
    let anchor = match expiry {
        Some(e) if e >= today => e,
        _ => today,
    };
    add_months_clamped(anchor, 1)
}

/// What `process_customer_expiry` did to one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExpiryOutcome {
    SkippedFree,
    NotExpired,
    SkippedVip,
    NoUnpaidInvoices,
    Expired {
        package_changed: bool,
        router_disabled: bool,
    },
}

impl ExpiryOutcome {
    pub fn is_expired(&self) -> bool {
        matches!(self, ExpiryOutcome::Expired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_lapsed_expiry_restarts_from_today() {
        assert_eq!(
            next_expiry(Some(date(2025, 1, 31)), date(2025, 3, 10)).unwrap(),
            date(2025, 4, 10)
        );
    }

    #[test]
    fn test_running_expiry_extends_and_clamps() {
        assert_eq!(
            next_expiry(Some(date(2025, 1, 31)), date(2025, 1, 15)).unwrap(),
            date(2025, 2, 28)
        );
    }

    #[test]
    fn test_expiry_today_is_running() {
        let today = date(2025, 3, 10);
        assert!(!is_past(Some(today), today));
        assert_eq!(next_expiry(Some(today), today).unwrap(), date(2025, 4, 10));
    }

    #[test]
    fn test_missing_expiry() {
        let today = date(2025, 3, 10);
        assert!(is_past(None, today));
        assert_eq!(next_expiry(None, today).unwrap(), date(2025, 4, 10));
    }
}
