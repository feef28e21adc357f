//! HTTP behaviour of the API over the in-memory platform

mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use core_kernel::TenantContext;
use domain_billing::{Customer, CustomerStatus};
use test_utils::{CompanyFixtures, CustomerBuilder, PrincipalFixtures, SUPER_ADMIN_HOST};

use common::{spawn, AsUser};

fn customer_body(username: &str) -> Value {
    json!({
        "name": "Rahim Uddin",
        "phone": "01710000001",
        "username": username,
        "password": "secret123"
    })
}

#[tokio::test]
async fn test_health_needs_no_tenant() {
    let app = spawn(vec![]).await;
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = spawn(vec![]).await;

    let generated = app.server.get("/health").await;
    assert!(!generated.header(interface_api::REQUEST_ID_HEADER).is_empty());

    let given = app
        .server
        .get("/health")
        .add_header(
            axum::http::HeaderName::from_static(interface_api::REQUEST_ID_HEADER),
            axum::http::HeaderValue::from_static("req-42"),
        )
        .await;
    assert_eq!(given.header(interface_api::REQUEST_ID_HEADER), "req-42");
}

#[tokio::test]
async fn test_unknown_host_is_not_found_before_auth() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;

    let response = app.server.get("/api/v1/customers").at("nobody.isp.test").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "not_found");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;

    app.server
        .get("/api/v1/customers")
        .at(&CompanyFixtures::host(&alpha))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_of_another_company_is_forbidden() {
    let alpha = CompanyFixtures::alpha();
    let beta = CompanyFixtures::beta();
    let app = spawn(vec![alpha.clone(), beta.clone()]).await;

    app.server
        .get("/api/v1/customers")
        .at(&CompanyFixtures::host(&alpha))
        .by(&PrincipalFixtures::admin(beta.id))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Company users cannot use the super-admin host either
    app.server
        .get("/api/v1/customers")
        .at(SUPER_ADMIN_HOST)
        .by(&PrincipalFixtures::admin(alpha.id))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_created_customer_belongs_to_host_tenant() {
    let alpha = CompanyFixtures::alpha();
    let beta = CompanyFixtures::beta();
    let app = spawn(vec![alpha.clone(), beta.clone()]).await;

    // The requested company is ignored on a tenant host
    let response = app
        .server
        .post(&format!("/api/v1/customers?company_id={}", beta.id.as_uuid()))
        .at(&CompanyFixtures::host(&alpha))
        .by(&PrincipalFixtures::operator(alpha.id))
        .json(&customer_body("rahim"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let customer: Customer = response.json();
    assert_eq!(customer.company_id, alpha.id);

    // Beta cannot see it
    app.server
        .get(&format!("/api/v1/customers/{}", customer.id.as_uuid()))
        .at(&CompanyFixtures::host(&beta))
        .by(&PrincipalFixtures::admin(beta.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Same username again in the same company
    app.server
        .post("/api/v1/customers")
        .at(&CompanyFixtures::host(&alpha))
        .by(&PrincipalFixtures::operator(alpha.id))
        .json(&customer_body("rahim"))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_super_admin_must_name_the_company() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;
    let root = PrincipalFixtures::super_admin();

    app.server
        .post("/api/v1/customers")
        .at(SUPER_ADMIN_HOST)
        .by(&root)
        .json(&customer_body("karim"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post(&format!("/api/v1/customers?company_id={}", alpha.id.as_uuid()))
        .at(SUPER_ADMIN_HOST)
        .by(&root)
        .json(&customer_body("karim"))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Customer>().company_id, alpha.id);
}

#[tokio::test]
async fn test_invalid_customer_is_unprocessable() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;

    let response = app
        .server
        .post("/api/v1/customers")
        .at(&CompanyFixtures::host(&alpha))
        .by(&PrincipalFixtures::operator(alpha.id))
        .json(&json!({
            "name": "",
            "phone": "01710000001",
            "username": "x",
            "password": "123"
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["error"], "validation_error");
}

#[tokio::test]
async fn test_transfer_beyond_balance_is_unprocessable() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;
    let host = CompanyFixtures::host(&alpha);
    let admin = PrincipalFixtures::admin(alpha.id);
    let reseller = PrincipalFixtures::reseller(alpha.id);
    let employee = PrincipalFixtures::employee(alpha.id);

    app.server
        .post(&format!("/api/v1/resellers/{}/balance", reseller.user_id.as_uuid()))
        .at(&host)
        .by(&admin)
        .json(&json!({ "amount": "50.00" }))
        .await
        .assert_status_ok();

    let response = app
        .server
        .post(&format!("/api/v1/resellers/{}/transfers", reseller.user_id.as_uuid()))
        .at(&host)
        .by(&reseller)
        .json(&json!({ "employee_id": employee.user_id, "amount": "100.00" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let balance = app
        .state
        .ledger
        .get_reseller_balance(&TenantContext::tenant(alpha.id), alpha.id, reseller.user_id)
        .await
        .unwrap();
    assert_eq!(balance.balance, dec!(50));

    // A reseller cannot fund themselves
    app.server
        .post(&format!("/api/v1/resellers/{}/balance", reseller.user_id.as_uuid()))
        .at(&host)
        .by(&reseller)
        .json(&json!({ "amount": "1000.00" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bulk_disable_reports_counts() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;
    let host = CompanyFixtures::host(&alpha);

    let customers: Vec<_> = (0..3).map(|_| CustomerBuilder::new(alpha.id).build()).collect();
    for customer in &customers {
        app.platform.seed_customer(customer).await;
    }
    let ids: Vec<_> = customers.iter().map(|c| c.id).collect();
    let body = json!({ "customer_ids": ids, "action": "disable" });

    app.server
        .post("/api/v1/bulk")
        .at(&host)
        .by(&PrincipalFixtures::operator(alpha.id))
        .json(&body)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/api/v1/bulk")
        .at(&host)
        .by(&PrincipalFixtures::admin(alpha.id))
        .json(&body)
        .await;
    response.assert_status_ok();
    let outcome: Value = response.json();
    assert_eq!(outcome["affected"], 3);
    assert_eq!(outcome["failed_chunks"], 0);

    for customer in &customers {
        let stored = app.platform.billing.raw_customer(customer.id).await.unwrap();
        assert_eq!(stored.status, CustomerStatus::Suspended);
    }
}

#[tokio::test]
async fn test_gateway_payment_is_recorded_and_audited() {
    let alpha = CompanyFixtures::alpha();
    let app = spawn(vec![alpha.clone()]).await;
    let host = CompanyFixtures::host(&alpha);
    let operator = PrincipalFixtures::operator(alpha.id);

    let customer = CustomerBuilder::new(alpha.id).username("rahim").build();
    app.platform.seed_customer(&customer).await;

    let response = app
        .server
        .post("/api/v1/gateways/bkash/payment")
        .at(&host)
        .by(&operator)
        .json(&json!({
            "customer_ref": "rahim",
            "amount": "525.00",
            "mobile_no": "01710000001",
            "trx_id": "TRX123",
            "datetime": "2025-01-15T08:00:00Z"
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["response"]["success"], true);
    assert_eq!(body["payment"]["payment"]["transaction_id"], "TRX123");

    assert_eq!(app.platform.gateway_audit.rows().await.len(), 1);
    assert_eq!(app.platform.billing.payments.read().await.len(), 1);

    app.server
        .post("/api/v1/gateways/nagad/payment")
        .at(&host)
        .by(&operator)
        .json(&json!({
            "customer_ref": "rahim",
            "amount": "1.00",
            "mobile_no": "01710000001",
            "trx_id": "TRX124",
            "datetime": "2025-01-15T08:00:00Z"
        }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ticket_workflow_over_http() {
    let alpha = CompanyFixtures::alpha();
    let beta = CompanyFixtures::beta();
    let app = spawn(vec![alpha.clone(), beta.clone()]).await;
    let host = CompanyFixtures::host(&alpha);
    let operator = PrincipalFixtures::operator(alpha.id);

    let response = app
        .server
        .post("/api/v1/tickets")
        .at(&host)
        .by(&operator)
        .json(&json!({
            "category": "connectivity",
            "subject": "No internet",
            "description": "PPP session drops",
            "priority": "high"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let ticket: Value = response.json();
    let id = ticket["id"].as_str().unwrap().to_string();
    assert_eq!(ticket["status"], "open");

    // Assignment is an admin action
    let technician = PrincipalFixtures::employee(alpha.id);
    let assign = json!({ "assigned_to": technician.user_id });
    app.server
        .post(&format!("/api/v1/tickets/{}/assign", id))
        .at(&host)
        .by(&operator)
        .json(&assign)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post(&format!("/api/v1/tickets/{}/assign", id))
        .at(&host)
        .by(&PrincipalFixtures::admin(alpha.id))
        .json(&assign)
        .await
        .assert_status_ok();

    app.server
        .post(&format!("/api/v1/tickets/{}/status", id))
        .at(&host)
        .by(&operator)
        .json(&json!({ "status": "closed" }))
        .await
        .assert_status_ok();
    app.server
        .post(&format!("/api/v1/tickets/{}/comments", id))
        .at(&host)
        .by(&operator)
        .json(&json!({ "comment": "still down" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let logs: Value = app
        .server
        .get(&format!("/api/v1/tickets/{}/logs", id))
        .at(&host)
        .by(&operator)
        .await
        .json();
    let actions: Vec<_> = logs.as_array().unwrap().iter().map(|l| l["action"].clone()).collect();
    assert_eq!(actions, vec![json!("created"), json!("assigned"), json!("closed")]);

    app.server
        .get(&format!("/api/v1/tickets/{}", id))
        .at(&CompanyFixtures::host(&beta))
        .by(&PrincipalFixtures::admin(beta.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let stats: Value = app
        .server
        .get("/api/v1/tickets/stats")
        .at(&host)
        .by(&operator)
        .await
        .json();
    assert_eq!(stats["closed"], 1);
    assert_eq!(stats["by_priority"]["high"], 1);
}
