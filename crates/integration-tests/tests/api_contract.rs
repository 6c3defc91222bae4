//! HTTP contract tests for the API router.
//!
//! Every request here is answered before a repository is touched, so the
//! lazy pool never connects and no database is needed.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use shopbot_api::middleware::REQUEST_ID_HEADER;
use shopbot_api::services::webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use shopbot_integration_tests::{
    body_json, send, service_token, service_token_with, sign_webhook, sign_webhook_with,
    test_config, test_state_with,
};

fn json_post(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn webhook_request(body: &[u8], timestamp: i64, signature: &str) -> Request<Body> {
    Request::post("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .header(TIMESTAMP_HEADER, timestamp.to_string())
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_vec()))
        .unwrap()
}

fn assert_error_envelope(json: &Value, code: &str) {
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], code);
    assert!(json["error"]["message"].is_string());
    assert!(json["timestamp"].is_string());
    assert!(json.get("data").is_none_or(Value::is_null));
}

// ============================================================================
// Liveness and cross-cutting headers
// ============================================================================

#[tokio::test]
async fn test_liveness() {
    let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_request_id_echoed() {
    let response = send(
        Request::get("/health")
            .header(REQUEST_ID_HEADER, "interaction-42")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        response.headers().get(REQUEST_ID_HEADER).unwrap(),
        "interaction-42"
    );
}

#[tokio::test]
async fn test_request_id_generated_and_security_headers_set() {
    let response = send(Request::get("/health").body(Body::empty()).unwrap()).await;
    let headers = response.headers();

    let id = headers.get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();
    assert_eq!(id.len(), 36, "expected a UUID, got {id}");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = send(Request::get("/api/nope").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Service authentication
// ============================================================================

#[tokio::test]
async fn test_catalog_write_requires_token() {
    let body = json!({ "guild_id": "123456789012345678", "name": "Roles" });
    let response = send(json_post("/api/categories", None, &body)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body_json(response).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let forged = service_token_with("some-other-secret-0123456789abcdefghij", "intruder");
    let body = json!({ "guild_id": "123456789012345678", "name": "Roles" });
    let response = send(json_post("/api/categories", Some(&forged), &body)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_authorization_header_rejected() {
    let request = Request::get("/api/payments/users/123456789012345678/orders")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body_json(response).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_order_creation_requires_token() {
    let body = json!({
        "guild_id": "123456789012345678",
        "discord_user_id": "223456789012345678",
        "product_id": 1
    });
    let response = send(json_post("/api/payments/orders", None, &body)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_product_with_negative_price_rejected() {
    let token = service_token();
    let body = json!({
        "guild_id": "123456789012345678",
        "name": "VIP",
        "price": "-5.00",
        "currency": "USDT"
    });
    let response = send(json_post("/api/products", Some(&token), &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_error_envelope(&json, "VALIDATION_ERROR");
    let details = json["error"]["details"].as_array().unwrap();
    assert!(details.iter().any(|d| d["field"] == "price"));
}

#[tokio::test]
async fn test_malformed_json_rejected_with_envelope() {
    let token = service_token();
    let request = Request::post("/api/categories")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from("{\"guild_id\": "))
        .unwrap();
    let response = send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_envelope(&body_json(response).await, "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_snowflake_in_query_rejected() {
    let response = send(
        Request::get("/api/categories?guild_id=not-a-snowflake")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Transaction security
// ============================================================================

#[tokio::test]
async fn test_scripted_large_order_blocked_before_handler() {
    let mut config = test_config();
    config.risk.block_threshold = 40;
    let app = shopbot_api::app(test_state_with(config));

    // curl (30) + 10000 USDT (30 + 10), no device (5)
    let body = json!({
        "guild_id": "123456789012345678",
        "discord_user_id": "223456789012345678",
        "product_id": 1,
        "amount": "10000",
        "currency": "USDT"
    });
    let mut request = json_post("/api/payments/orders", Some(&service_token()), &body);
    request
        .headers_mut()
        .insert(header::USER_AGENT, "curl/8.5.0".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_error_envelope(&body_json(response).await, "TRANSACTION_BLOCKED");
}

// ============================================================================
// Webhooks
// ============================================================================

#[tokio::test]
async fn test_webhook_without_signature_rejected() {
    let request = Request::post("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(request).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body_json(response).await, "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_webhook_signed_with_wrong_secret_rejected() {
    let body = br#"{"event_id":"evt_1"}"#;
    let (timestamp, signature) =
        sign_webhook_with("not-the-webhook-secret-0123456789abcdef", body);
    let response = send(webhook_request(body, timestamp, &signature)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body_json(response).await, "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_webhook_tampered_body_rejected() {
    let (timestamp, signature) = sign_webhook(br#"{"amount":"10.00"}"#);
    let response = send(webhook_request(
        br#"{"amount":"0.01"}"#,
        timestamp,
        &signature,
    ))
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_valid_signature_invalid_payload() {
    let body = json!({
        "event_id": "evt_1",
        "order_id": "00000000-0000-4000-8000-000000000000",
        "status": "confirmed",
        "amount": "-1.00",
        "currency": "USDT"
    })
    .to_string();
    let (timestamp, signature) = sign_webhook(body.as_bytes());
    let response = send(webhook_request(body.as_bytes(), timestamp, &signature)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_envelope(&body_json(response).await, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_webhook_valid_signature_unparseable_body() {
    let body = b"not json";
    let (timestamp, signature) = sign_webhook(body);
    let response = send(webhook_request(body, timestamp, &signature)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_error_envelope(&body_json(response).await, "BAD_REQUEST");
}
