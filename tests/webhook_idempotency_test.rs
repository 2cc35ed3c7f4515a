//! Integration tests for the Stripe webhook handler.
//!
//! Covers signature verification, status transitions, and the
//! at-most-once-per-event-id guarantee for payment notifications and LINE
//! receipt pushes.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status, response_json, TestApp};
use hmac::{Hmac, Mac};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use sha2::Sha256;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// Build a `Stripe-Signature` header for a payload, as Stripe would.
fn stripe_signature(secret: &str, payload: &[u8]) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let signed = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed.as_bytes());
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

fn payment_intent_event(intent_id: &str, order_id: &str, amount_minor: i64) -> Value {
    json!({
        "id": format!("evt_{}", intent_id),
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id,
                "amount_received": amount_minor,
                "metadata": {"order_id": order_id}
            }
        }
    })
}

async fn deliver(app: &TestApp, secret: &str, event: &Value) -> axum::http::Response<axum::body::Body> {
    let payload = event.to_string().into_bytes();
    let signature = stripe_signature(secret, &payload);
    app.request_raw(
        Method::POST,
        "/api/webhooks/stripe",
        payload,
        &[("Stripe-Signature", signature.as_str())],
    )
    .await
}

async fn seed_order(app: &TestApp) -> (String, String) {
    app.seed_category("food").await;
    let product = app.seed_product("food", "Dog Food", dec!(400), 10).await;
    let shipping = app.seed_shipping_option("Courier", dec!(50)).await;

    let body = response_json(
        app.request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{"product_id": product.id.to_string(), "quantity": 1}],
                "customer_name": "Suda",
                "customer_phone": "0899999999",
                "customer_address": "Chiang Mai",
                "shipping_option_id": shipping.id.to_string(),
            })),
        )
        .await,
    )
    .await;

    (
        body["data"]["id"].as_str().unwrap().to_string(),
        body["data"]["order_number"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn duplicate_delivery_creates_one_notification() {
    let app = TestApp::with_config(|cfg| {
        cfg.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    })
    .await;
    let (order_id, order_number) = seed_order(&app).await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    let event = payment_intent_event("pi_test_1", &order_id, 45000);

    let first = deliver(&app, WEBHOOK_SECRET, &event).await;
    assert_status(&first, StatusCode::OK);

    // Order is confirmed.
    let order = response_json(
        app.request(Method::GET, &format!("/api/orders/{}", order_number), None)
            .await,
    )
    .await;
    assert_eq!(order["data"]["status"], "CONFIRMED");

    // Same event again: accepted, but nothing new is recorded.
    let second = deliver(&app, WEBHOOK_SECRET, &event).await;
    assert_status(&second, StatusCode::OK);

    let notifications = response_json(
        app.request_with_token(
            Method::GET,
            "/api/admin/payment-notifications",
            None,
            &admin_token,
        )
        .await,
    )
    .await;
    let items = notifications["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["slip_filename"], "stripe-payment-pi_test_1");
    assert_eq!(items[0]["status"], "APPROVED");
}

#[tokio::test]
async fn line_receipt_is_pushed_at_most_once() {
    let line_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/bot/message/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&line_mock)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
        cfg.line.api_base = line_mock.uri();
        cfg.line.push_enabled = true;
        cfg.line.channel_access_token = "test-token".to_string();
    })
    .await;

    // The receipt needs an order linked to a LINE account.
    let (customer, customer_token) = app.seed_user("Ucustomer", false).await;
    app.seed_category("food").await;
    let product = app.seed_product("food", "Cat Food", dec!(300), 5).await;
    let shipping = app.seed_shipping_option("Courier", dec!(0)).await;

    let body = response_json(
        app.request_with_token(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{"product_id": product.id.to_string(), "quantity": 1}],
                "customer_name": "Suda",
                "customer_phone": "0899999999",
                "customer_address": "Chiang Mai",
                "shipping_option_id": shipping.id.to_string(),
            })),
            &customer_token,
        )
        .await,
    )
    .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(
        body["data"]["user_id"].as_str().unwrap(),
        customer.id.to_string()
    );

    let event = payment_intent_event("pi_receipt_1", &order_id, 30000);
    assert_status(
        &deliver(&app, WEBHOOK_SECRET, &event).await,
        StatusCode::OK,
    );
    assert_status(
        &deliver(&app, WEBHOOK_SECRET, &event).await,
        StatusCode::OK,
    );

    // MockServer verifies the expect(1) on drop.
}

#[tokio::test]
async fn checkout_session_event_uses_its_own_key() {
    let app = TestApp::with_config(|cfg| {
        cfg.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    })
    .await;
    let (_, order_number) = seed_order(&app).await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    let event = json!({
        "id": "evt_cs_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "amount_total": 45000,
                "client_reference_id": order_number,
            }
        }
    });

    assert_status(
        &deliver(&app, WEBHOOK_SECRET, &event).await,
        StatusCode::OK,
    );

    let notifications = response_json(
        app.request_with_token(
            Method::GET,
            "/api/admin/payment-notifications",
            None,
            &admin_token,
        )
        .await,
    )
    .await;
    let items = notifications["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["slip_filename"], "stripe-session-cs_test_1");
}

#[tokio::test]
async fn failed_payment_cancels_a_pending_order() {
    let app = TestApp::with_config(|cfg| {
        cfg.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    })
    .await;
    let (order_id, order_number) = seed_order(&app).await;

    let event = json!({
        "id": "evt_fail_1",
        "type": "payment_intent.payment_failed",
        "data": {
            "object": {
                "id": "pi_fail_1",
                "metadata": {"order_id": order_id},
                "last_payment_error": {"message": "card declined"}
            }
        }
    });

    assert_status(
        &deliver(&app, WEBHOOK_SECRET, &event).await,
        StatusCode::OK,
    );

    let order = response_json(
        app.request(Method::GET, &format!("/api/orders/{}", order_number), None)
            .await,
    )
    .await;
    assert_eq!(order["data"]["status"], "CANCELLED");
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let app = TestApp::with_config(|cfg| {
        cfg.stripe.webhook_secret = Some(WEBHOOK_SECRET.to_string());
    })
    .await;
    let (order_id, _) = seed_order(&app).await;

    let event = payment_intent_event("pi_forged", &order_id, 45000);
    let response = deliver(&app, "whsec_wrong_secret", &event).await;
    assert_status(&response, StatusCode::UNAUTHORIZED);

    let unsigned = app
        .request_raw(
            Method::POST,
            "/api/webhooks/stripe",
            event.to_string().into_bytes(),
            &[],
        )
        .await;
    assert_status(&unsigned, StatusCode::UNAUTHORIZED);
}
