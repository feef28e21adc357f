//! Customer, invoice and payment DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, InvoiceId, UserId};
use domain_billing::{CustomerStatus, Invoice, InvoiceStatus, PaymentMethod, PaymentType};
use domain_tenancy::CompanyStatus;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerListQuery {
    pub status: Option<CustomerStatus>,
    pub reseller_id: Option<UserId>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub customer_id: Option<CustomerId>,
    pub status: Option<InvoiceStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentListQuery {
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompanyListQuery {
    pub status: Option<CompanyStatus>,
}

/// Body for expiry extension and recharge
#[derive(Debug, Deserialize)]
pub struct PaymentTypeRequest {
    pub payment_type: PaymentType,
}

/// A manual payment taken by an operator
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub invoice_id: Option<InvoiceId>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExpiryResponse {
    pub customer_id: CustomerId,
    pub expiry_date: NaiveDate,
}

/// Result of invoicing one customer; `invoice` is absent when skipped
#[derive(Debug, Serialize)]
pub struct CustomerInvoiceResponse {
    pub customer_id: CustomerId,
    pub invoice: Option<Invoice>,
}

#[derive(Debug, Deserialize)]
pub struct CommissionRateRequest {
    pub commission_percent: Option<Decimal>,
}
