//! Public API tests for domain_billing

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CompanyId, CustomerId, UserId};

use domain_billing::{
    next_expiry, InvoiceNumber, InvoicePricing, InvoiceStatus, NewPayment, Payment, PaymentMethod,
    PaymentType, ResellerCommission,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Pricing
// ============================================================================

mod pricing_tests {
    use super::*;

    #[test]
    fn test_package_vat_beats_company_vat() {
        let pricing = InvoicePricing::compute(dec!(100.00), Some(dec!(15)), Some(dec!(5))).unwrap();
        assert_eq!(pricing.vat_amount, dec!(15.00));
        assert_eq!(pricing.total_amount, dec!(115.00));
    }

    #[test]
    fn test_null_package_vat_uses_company_vat() {
        let pricing = InvoicePricing::compute(dec!(100.00), None, Some(dec!(5))).unwrap();
        assert_eq!(pricing.vat_amount, dec!(5.00));
        assert_eq!(pricing.total_amount, dec!(105.00));
    }

    #[test]
    fn test_invalid_vat_rejected() {
        assert!(InvoicePricing::compute(dec!(100.00), Some(dec!(-1)), None).is_err());
    }
}

// ============================================================================
// Invoice numbering
// ============================================================================

mod numbering_tests {
    use super::*;

    #[test]
    fn test_zero_padded_sequence() {
        assert_eq!(InvoiceNumber::format(date(2025, 1, 5), 1), "INV-20250105-0001");
        assert_eq!(InvoiceNumber::format(date(2025, 1, 5), 42), "INV-20250105-0042");
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(InvoiceStatus::Partial.as_str(), "partial");
        assert_eq!("cancelled".parse::<InvoiceStatus>().unwrap(), InvoiceStatus::Cancelled);
    }
}

// ============================================================================
// Expiry extension
// ============================================================================

mod expiry_tests {
    use super::*;

    #[test]
    fn test_past_expiry_extends_from_today() {
        assert_eq!(
            next_expiry(Some(date(2025, 1, 31)), date(2025, 3, 10)).unwrap(),
            date(2025, 4, 10)
        );
    }

    #[test]
    fn test_future_expiry_clamps_to_month_end() {
        assert_eq!(
            next_expiry(Some(date(2025, 1, 31)), date(2025, 1, 20)).unwrap(),
            date(2025, 2, 28)
        );
        assert_eq!(
            next_expiry(Some(date(2024, 1, 31)), date(2024, 1, 20)).unwrap(),
            date(2024, 2, 29)
        );
    }

    #[test]
    fn test_payment_type_maps_to_method() {
        assert_eq!(PaymentMethod::from(PaymentType::Due), PaymentMethod::Due);
        assert_eq!(PaymentMethod::from(PaymentType::Receive), PaymentMethod::Receive);
    }

    proptest! {
        #[test]
        fn prop_extension_never_before_today(
            today_offset in 0i64..3650,
            expiry_offset in -400i64..400,
        ) {
            let today = date(2020, 1, 1) + chrono::Duration::days(today_offset);
            let expiry = today + chrono::Duration::days(expiry_offset);
            let next = next_expiry(Some(expiry), today).unwrap();
            prop_assert!(next > today);
            prop_assert!(next > expiry || expiry < today);
            prop_assert!(next <= std::cmp::max(today, expiry) + chrono::Duration::days(31));
        }
    }
}

// ============================================================================
// Commission and payments
// ============================================================================

mod commission_tests {
    use super::*;

    #[test]
    fn test_commission_off_base_amount() {
        let c = ResellerCommission::accrue(
            CompanyId::new(),
            UserId::new(),
            CustomerId::new(),
            None,
            dec!(850.00),
            dec!(12.5),
        )
        .unwrap();
        assert_eq!(c.commission_amount, dec!(106.25));
    }

    proptest! {
        #[test]
        fn prop_commission_within_base(cents in 0i64..10_000_000, percent in 0u32..=100) {
            let base = Decimal::new(cents, 2);
            let c = ResellerCommission::accrue(
                CompanyId::new(),
                UserId::new(),
                CustomerId::new(),
                None,
                base,
                Decimal::from(percent),
            )
            .unwrap();
            prop_assert!(c.commission_amount >= Decimal::ZERO);
            prop_assert!(c.commission_amount <= base);
        }
    }

    #[test]
    fn test_gateway_payment_builder() {
        let request = NewPayment::new(CustomerId::new(), dec!(500), PaymentMethod::Online)
            .via_gateway("nagad", "NG-1");
        let payment = Payment::record(CompanyId::new(), request, Utc::now());
        assert_eq!(payment.payment_gateway.as_deref(), Some("nagad"));
        assert_eq!(payment.transaction_id.as_deref(), Some("NG-1"));
    }
}
