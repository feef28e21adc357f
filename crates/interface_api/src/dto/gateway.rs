//! Payment gateway DTOs

use serde::{Deserialize, Serialize};

use domain_billing::PaymentOutcome;
use domain_integrations::GatewayResponse;

#[derive(Debug, Deserialize)]
pub struct CheckBillRequest {
    pub customer_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub trx_id: String,
}

#[derive(Debug, Serialize)]
pub struct GatewayPaymentResponse {
    pub response: GatewayResponse,
    /// Recorded only when the gateway accepted the payment
    pub payment: Option<PaymentOutcome>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub gateway: Option<String>,
    pub limit: Option<u32>,
}
