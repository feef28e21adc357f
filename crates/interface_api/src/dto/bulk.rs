//! Bulk operation DTOs

use serde::Deserialize;

use core_kernel::CustomerId;
use domain_bulk::{BulkVerb, FieldMapping};

/// `{"customer_ids": [...], "action": "extend_expiry", "days": 30}`
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub customer_ids: Vec<CustomerId>,
    #[serde(flatten)]
    pub verb: BulkVerb,
}

/// CSV upload as text; columns map by header name
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub file_name: String,
    pub content: String,
    /// Defaults to matching columns named after the customer fields
    pub mapping: Option<FieldMapping>,
}
