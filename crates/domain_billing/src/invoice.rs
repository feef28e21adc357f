//! Invoices
//!
//! One invoice per billing cycle per customer. Numbers are
//! `INV-YYYYMMDD-NNNN`, where `NNNN` comes from an atomic per-company,
//! per-day counter owned by the store.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CompanyId, CustomerId, InvoiceId};

use crate::customer::string_enum;
use crate::error::BillingError;
use crate::package::InvoicePricing;

/// Days between billing date and due date
pub const DUE_AFTER_DAYS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Partial,
    Paid,
    Cancelled,
}

string_enum!(InvoiceStatus {
    Unpaid => "unpaid",
    Partial => "partial",
    Paid => "paid",
    Cancelled => "cancelled",
});

/// Formats invoice numbers
pub struct InvoiceNumber;

impl InvoiceNumber {
    /// `INV-20250310-0007` for the 7th invoice of a company on 2025-03-10
    pub fn format(billing_date: NaiveDate, sequence: u32) -> String {
        format!("INV-{}-{:04}", billing_date.format("%Y%m%d"), sequence)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub company_id: CompanyId,
    pub customer_id: CustomerId,
    pub invoice_number: String,
    pub billing_date: NaiveDate,
    pub due_date: NaiveDate,
    pub base_price: Decimal,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    pub payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates an unpaid invoice
    pub fn issue(
        company_id: CompanyId,
        customer_id: CustomerId,
        invoice_number: String,
        billing_date: NaiveDate,
        due_date: NaiveDate,
        pricing: InvoicePricing,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: InvoiceId::new_v7(),
            company_id,
            customer_id,
            invoice_number,
            billing_date,
            due_date,
            base_price: pricing.base_price,
            vat_amount: pricing.vat_amount,
            total_amount: pricing.total_amount,
            status: InvoiceStatus::Unpaid,
            payment_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fails if the invoice can no longer take payments
    pub fn ensure_open(&self) -> Result<(), BillingError> {
        match self.status {
            InvoiceStatus::Unpaid | InvoiceStatus::Partial => Ok(()),
            InvoiceStatus::Paid | InvoiceStatus::Cancelled => Err(BillingError::InvoiceClosed {
                invoice_number: self.invoice_number.clone(),
                status: self.status.to_string(),
            }),
        }
    }

    /// Updates status from the sum of all payments recorded against it
    ///
    /// Fully covered ⇒ `paid` with `payment_date`; anything less ⇒ `partial`.
    pub fn reconcile(&mut self, paid_total: Decimal, at: DateTime<Utc>) -> Result<(), BillingError> {
        self.ensure_open()?;
        if paid_total >= self.total_amount {
            self.status = InvoiceStatus::Paid;
            self.payment_date = Some(at);
        } else if paid_total > Decimal::ZERO {
            self.status = InvoiceStatus::Partial;
        }
        self.updated_at = at;
        Ok(())
    }

    pub fn outstanding(&self, paid_total: Decimal) -> Decimal {
        (self.total_amount - paid_total).max(Decimal::ZERO)
    }
}

/// Filter for invoice listings
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub customer_id: Option<CustomerId>,
    pub status: Option<InvoiceStatus>,
    pub limit: Option<u32>,
}

impl InvoiceQuery {
    pub fn matches(&self, invoice: &Invoice) -> bool {
        self.customer_id.map_or(true, |c| invoice.customer_id == c)
            && self.status.map_or(true, |s| invoice.status == s)
    }
}
