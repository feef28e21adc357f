//! Service packages and invoice pricing

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{percent_of, round_money, CompanyId, MoneyError, PackageId};

/// A priced internet plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub company_id: CompanyId,
    pub name: String,
    /// Price excluding VAT
    pub price: Decimal,
    /// Falls back to the company rate when `None`
    pub vat_percent: Option<Decimal>,
    pub duration_days: u32,
    /// PPP profile assigned on the router
    pub profile: Option<String>,
    /// Degraded plan customers are moved to when expired for nonpayment
    pub is_expired_package: bool,
    pub created_at: DateTime<Utc>,
}

impl Package {
    pub fn from_request(company_id: CompanyId, request: NewPackage) -> Self {
        Self {
            id: PackageId::new_v7(),
            company_id,
            name: request.name,
            price: round_money(request.price),
            vat_percent: request.vat_percent,
            duration_days: request.duration_days.unwrap_or(30),
            profile: request.profile,
            is_expired_package: request.is_expired_package,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewPackage {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub price: Decimal,
    pub vat_percent: Option<Decimal>,
    #[validate(range(min = 1))]
    pub duration_days: Option<u32>,
    pub profile: Option<String>,
    #[serde(default)]
    pub is_expired_package: bool,
}

/// Price breakdown of one billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePricing {
    pub base_price: Decimal,
    pub vat_percent: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
}

impl InvoicePricing {
    /// Prices a package
    ///
    /// The VAT rate is the package's own rate, else the company's, else zero.
    ///
    /// # Example
    ///
    /// ```rust
    /// use domain_billing::package::InvoicePricing;
    /// use rust_decimal_macros::dec;
    ///
    /// let pricing = InvoicePricing::compute(dec!(100.00), Some(dec!(15)), Some(dec!(5))).unwrap();
    /// assert_eq!(pricing.vat_amount, dec!(15.00));
    /// assert_eq!(pricing.total_amount, dec!(115.00));
    /// ```
    pub fn compute(
        price: Decimal,
        package_vat: Option<Decimal>,
        company_vat: Option<Decimal>,
    ) -> Result<Self, MoneyError> {
        let base_price = round_money(price);
        let vat_percent = package_vat.or(company_vat).unwrap_or(Decimal::ZERO);
        let vat_amount = percent_of(base_price, vat_percent)?;
        let total_amount = base_price
            .checked_add(vat_amount)
            .map(round_money)
            .ok_or(MoneyError::Overflow)?;

        Ok(Self {
            base_price,
            vat_percent,
            vat_amount,
            total_amount,
        })
    }

    pub fn for_package(package: &Package, company_vat: Option<Decimal>) -> Result<Self, MoneyError> {
        Self::compute(package.price, package.vat_percent, company_vat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_package_vat_wins_over_company() {
        let p = InvoicePricing::compute(dec!(100.00), Some(dec!(15)), Some(dec!(5))).unwrap();
        assert_eq!(p.vat_percent, dec!(15));
        assert_eq!(p.vat_amount, dec!(15.00));
        assert_eq!(p.total_amount, dec!(115.00));
    }

    #[test]
    fn test_company_vat_fallback() {
        let p = InvoicePricing::compute(dec!(100.00), None, Some(dec!(5))).unwrap();
        assert_eq!(p.vat_amount, dec!(5.00));
        assert_eq!(p.total_amount, dec!(105.00));
    }

    #[test]
    fn test_no_vat_anywhere() {
        let p = InvoicePricing::compute(dec!(850.00), None, None).unwrap();
        assert_eq!(p.vat_amount, dec!(0.00));
        assert_eq!(p.total_amount, dec!(850.00));
    }

    #[test]
    fn test_vat_rounded_to_two_places() {
        let p = InvoicePricing::compute(dec!(333.33), Some(dec!(7.5)), None).unwrap();
        assert_eq!(p.vat_amount, dec!(25.00));
        assert_eq!(p.total_amount, dec!(358.33));
    }
}
