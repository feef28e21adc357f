//! Tests for the typed identifiers

use core_kernel::{CompanyId, CustomerId, InvoiceId};
use uuid::Uuid;

#[test]
fn test_ids_are_unique() {
    assert_ne!(CustomerId::new(), CustomerId::new());
}

#[test]
fn test_display_and_parse_round() {
    let id = InvoiceId::new();
    let text = id.to_string();
    assert!(text.starts_with("INV-"));
    assert_eq!(text.parse::<InvoiceId>().unwrap(), id);
}

#[test]
fn test_parse_bare_uuid() {
    let raw = Uuid::new_v4();
    let id: CompanyId = raw.to_string().parse().unwrap();
    assert_eq!(id.into_uuid(), raw);
}

#[test]
fn test_serde_is_transparent_uuid() {
    let id = CompanyId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_uuid()));
}
