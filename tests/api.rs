mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lastmile_ledger::api::rest::router;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{harness, Harness, CODE};

fn app(h: &Harness) -> axum::Router {
    router(h.state.clone())
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn send(h: &Harness, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(h).oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn create_client(h: &Harness, email: &str) -> String {
    let (status, body) = send(
        h,
        json_request(
            "POST",
            "/users",
            json!({
                "name": "Nile Traders",
                "email": email,
                "roles": ["Client"],
                "client": { "flat_rate": "75" }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_courier(h: &Harness) -> String {
    let (status, body) = send(
        h,
        json_request(
            "POST",
            "/users",
            json!({
                "name": "Karim",
                "email": "karim@example.com",
                "roles": ["Courier"],
                "courier": { "zones": ["Z1"] }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_shipment(h: &Harness, client_id: &str) -> String {
    let (status, body) = send(
        h,
        json_request(
            "POST",
            "/shipments",
            json!({
                "client_id": client_id,
                "recipient": { "name": "Mona", "phone": "+201000000003" },
                "origin": { "line": "12 Tahrir Sq", "city": "Cairo", "zone": "DOWNTOWN" },
                "destination": { "line": "7 Corniche Rd", "city": "Giza", "zone": "Z1" },
                "package_value": "500",
                "payment_method": "CashOnDelivery"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["tracking_code"], "GIZ-20260314-000001");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let h = harness();
    let (status, body) = send(&h, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["shipments"], 0);
    assert_eq!(body["users"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let h = harness();
    let client_id = create_client(&h, "metrics@example.com").await;
    let shipment_id = create_shipment(&h, &client_id).await;
    send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/status"),
            json!({ "status": "PackagedAwaitingAssignment" }),
        ),
    )
    .await;

    let response = app(&h).oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("status_transitions_total"));
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let h = harness();
    create_client(&h, "dup@example.com").await;

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            "/users",
            json!({
                "name": "Other",
                "email": "DUP@example.com",
                "roles": ["Client"],
                "client": { "flat_rate": "10" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "DuplicateEmail");
}

#[tokio::test]
async fn unknown_shipment_is_not_found() {
    let h = harness();
    let (status, body) = send(
        &h,
        get_request("/shipments/00000000-0000-0000-0000-000000000000"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NotFound");
}

#[tokio::test]
async fn unknown_status_is_rejected_at_the_boundary() {
    let h = harness();
    let client_id = create_client(&h, "status@example.com").await;
    let shipment_id = create_shipment(&h, &client_id).await;

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/status"),
            json!({ "status": "Teleported" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "InvalidStatus");
}

#[tokio::test]
async fn full_delivery_over_http() {
    let h = harness();
    let client_id = create_client(&h, "flow@example.com").await;
    let courier_id = create_courier(&h).await;
    let shipment_id = create_shipment(&h, &client_id).await;

    let (status, _) = send(
        &h,
        json_request(
            "PATCH",
            &format!("/couriers/{courier_id}/settings"),
            json!({ "commission": { "type": "flat", "value": "30" } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/status"),
            json!({ "status": "PackagedAwaitingAssignment", "packaging_notes": "fragile" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["packaging_notes"], "fragile");

    let (status, body) = send(&h, json_request("POST", "/assignments/auto", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned"], 1);

    let (status, _) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/verification"),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/verification/confirm"),
            json!({ "code": "000000" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "CodeMismatch");

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/verification/confirm"),
            json!({ "code": CODE }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_history"].as_array().unwrap().len(), 4);

    let (status, body) = send(&h, get_request(&format!("/clients/{client_id}/wallet"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["balance"]), dec!(425));

    let (status, body) = send(
        &h,
        get_request(&format!("/couriers/{courier_id}/financials")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["earnings"]), dec!(30));

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            "/payouts",
            json!({ "ledger": "courier", "owner_id": courier_id, "amount": "20" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let entry_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/payouts/courier/{entry_id}/process"),
            json!({ "evidence": "receipt.png" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processed");

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/payouts/courier/{entry_id}/decline"),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationFailed");
}

#[tokio::test]
async fn revert_outside_whitelist_is_a_conflict() {
    let h = harness();
    let client_id = create_client(&h, "revert@example.com").await;
    let shipment_id = create_shipment(&h, &client_id).await;

    let (status, body) = send(
        &h,
        json_request("POST", &format!("/shipments/{shipment_id}/revert"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "InvalidRevert");
}

#[tokio::test]
async fn tiers_and_overrides_over_http() {
    let h = harness();
    let client_id = create_client(&h, "tier@example.com").await;

    let (status, body) = send(
        &h,
        json_request(
            "PUT",
            "/tiers",
            json!([
                { "name": "Silver", "threshold": 5, "discount_percent": "5" },
                { "name": "Gold", "threshold": 10, "discount_percent": "10" }
            ]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Gold");

    let (status, body) = send(
        &h,
        json_request(
            "PUT",
            &format!("/clients/{client_id}/tier"),
            json!({ "tier": "Gold" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client"]["tier"], "Gold");
    assert_eq!(body["client"]["tier_locked"], true);

    let (status, body) = send(&h, get_request(&format!("/clients/{client_id}/summary"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shipments"], 0);
}

#[tokio::test]
async fn penalties_validate_amounts() {
    let h = harness();
    let courier_id = create_courier(&h).await;

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/couriers/{courier_id}/penalties"),
            json!({ "amount": "0", "reason": "late" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "ValidationFailed");

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/couriers/{courier_id}/bonuses"),
            json!({ "amount": "12.50", "reason": "holiday shift" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["amount"]), dec!(12.50));
    assert_eq!(body["kind"], "bonus");
}

#[tokio::test]
async fn confirmation_code_is_compared_exactly() {
    let h = harness();
    let client_id = create_client(&h, "exact@example.com").await;
    let courier_id = create_courier(&h).await;
    let shipment_id = create_shipment(&h, &client_id).await;

    let (status, _) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/status"),
            json!({ "status": "PackagedAwaitingAssignment" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/assign"),
            json!({ "courier_id": courier_id }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/verification"),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h,
        json_request(
            "POST",
            &format!("/shipments/{shipment_id}/verification/confirm"),
            json!({ "code": format!(" {CODE} ") }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "CodeMismatch");

    let (status, body) = send(&h, get_request(&format!("/shipments/{shipment_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["status_history"].as_array().unwrap();
    assert_eq!(history.last().unwrap()["status"], "AssignedToCourier");
}
