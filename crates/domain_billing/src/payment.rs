//! Payments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CompanyId, CustomerId, InvoiceId, PaymentId, UserId};

use crate::customer::string_enum;

/// How a payment was collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash or transfer received by an operator
    Receive,
    /// Service extended on credit; the amount is owed
    Due,
    /// Collected through a payment gateway
    Online,
}

string_enum!(PaymentMethod {
    Receive => "receive",
    Due => "due",
    Online => "online",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub company_id: CompanyId,
    pub customer_id: CustomerId,
    pub invoice_id: Option<InvoiceId>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_gateway: Option<String>,
    pub transaction_id: Option<String>,
    pub operator_id: Option<UserId>,
    pub payment_date: DateTime<Utc>,
}

/// A payment to record against a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub customer_id: CustomerId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    #[serde(default)]
    pub payment_gateway: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub operator_id: Option<UserId>,
}

impl NewPayment {
    pub fn new(customer_id: CustomerId, amount: Decimal, payment_method: PaymentMethod) -> Self {
        Self {
            customer_id,
            amount,
            payment_method,
            invoice_id: None,
            payment_gateway: None,
            transaction_id: None,
            operator_id: None,
        }
    }

    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn by_operator(mut self, operator_id: UserId) -> Self {
        self.operator_id = Some(operator_id);
        self
    }

    pub fn via_gateway(mut self, gateway: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        self.payment_gateway = Some(gateway.into());
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

impl Payment {
    /// Stamps a request with an id and the payment time
    pub fn record(company_id: CompanyId, request: NewPayment, at: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new_v7(),
            company_id,
            customer_id: request.customer_id,
            invoice_id: request.invoice_id,
            amount: request.amount,
            payment_method: request.payment_method,
            payment_gateway: request.payment_gateway,
            transaction_id: request.transaction_id,
            operator_id: request.operator_id,
            payment_date: at,
        }
    }
}
