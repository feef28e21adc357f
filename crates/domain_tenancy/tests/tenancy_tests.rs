//! Public-API tests for tenancy configuration and host helpers

use domain_tenancy::{extract_subdomain, normalize_host, TenancyConfig};

#[test]
fn test_config_deserializes_with_defaults() {
    let config: TenancyConfig =
        serde_json::from_str(r#"{"base_domain":"isp.example","default_vat_percent":"5"}"#).unwrap();
    assert_eq!(config.base_domain, "isp.example");
    assert_eq!(config.super_admin_domain, "admin.example.com");
    assert_eq!(config.default_vat_percent.to_string(), "5");
    assert_eq!(config.default_timezone.name(), "Asia/Dhaka");
}

#[test]
fn test_subdomain_of_normalized_host() {
    let host = normalize_host("Shop.ISP.example:8443");
    assert_eq!(extract_subdomain(&host, "isp.example"), Some("shop"));
}
