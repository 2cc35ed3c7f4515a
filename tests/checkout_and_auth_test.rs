//! Integration tests for Stripe checkout session creation, LINE sign-in, and
//! the upload diagnostics endpoint.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

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
async fn checkout_session_moves_the_order_to_payment_pending() {
    let stripe_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains("client_reference_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_abc",
            "url": "https://checkout.stripe.com/pay/cs_test_abc"
        })))
        .expect(1)
        .mount(&stripe_mock)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.stripe.api_base = stripe_mock.uri();
        cfg.stripe.secret_key = "sk_test_key".to_string();
    })
    .await;
    let (_, order_number) = seed_order(&app).await;

    let response = app
        .request(
            Method::POST,
            "/api/checkout/session",
            Some(json!({"order_number": order_number})),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"], "cs_test_abc");
    assert!(body["data"]["url"]
        .as_str()
        .unwrap()
        .contains("checkout.stripe.com"));

    let order = response_json(
        app.request(Method::GET, &format!("/api/orders/{}", order_number), None)
            .await,
    )
    .await;
    assert_eq!(order["data"]["status"], "PAYMENT_PENDING");
}

#[tokio::test]
async fn checkout_session_for_a_confirmed_order_is_rejected() {
    let app = TestApp::new().await;
    let (order_id, order_number) = seed_order(&app).await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    app.request_with_token(
        Method::PUT,
        &format!("/api/admin/orders/{}/status", order_id),
        Some(json!({"status": "CONFIRMED"})),
        &admin_token,
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/checkout/session",
            Some(json!({"order_number": order_number})),
        )
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn line_sign_in_upserts_the_user_and_issues_a_session() {
    let line_mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/profile"))
        .and(header("authorization", "Bearer line-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userId": "U1234567890abcdef",
            "displayName": "Somchai",
            "pictureUrl": "https://profile.line-scdn.net/somchai.jpg"
        })))
        .mount(&line_mock)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.line.api_base = line_mock.uri();
    })
    .await;

    let first = app
        .request(
            Method::POST,
            "/api/auth/line",
            Some(json!({"access_token": "line-access-token"})),
        )
        .await;
    assert_status(&first, StatusCode::OK);
    let body = response_json(first).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["display_name"], "Somchai");
    assert_eq!(body["data"]["user"]["is_admin"], false);
    let first_user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();

    // The session works against /me.
    let me = app
        .request_with_token(Method::GET, "/api/auth/me", None, &token)
        .await;
    assert_status(&me, StatusCode::OK);

    // Signing in again refreshes the same account instead of creating a new one.
    let second = response_json(
        app.request(
            Method::POST,
            "/api/auth/line",
            Some(json!({"access_token": "line-access-token"})),
        )
        .await,
    )
    .await;
    assert_eq!(second["data"]["user"]["id"], first_user_id.as_str());
}

#[tokio::test]
async fn rejected_line_token_yields_unauthorized() {
    let line_mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&line_mock)
        .await;

    let app = TestApp::with_config(|cfg| {
        cfg.line.api_base = line_mock.uri();
    })
    .await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/line",
            Some(json!({"access_token": "bogus"})),
        )
        .await;
    assert_status(&response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn uploads_health_reports_the_directory_state() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let upload_dir = tmp.path().join("uploads");
    tokio::fs::create_dir_all(&upload_dir).await.unwrap();

    let app = TestApp::with_config(|cfg| {
        cfg.upload_dir = upload_dir.to_string_lossy().to_string();
    })
    .await;

    let response = app.request(Method::GET, "/api/uploads/health", None).await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["exists"], true);
    assert_eq!(body["data"]["writable"], true);

    // A missing directory reports unhealthy rather than erroring.
    let gone = TestApp::with_config(|cfg| {
        cfg.upload_dir = "/nonexistent/petshop-uploads".to_string();
    })
    .await;
    let response = gone.request(Method::GET, "/api/uploads/health", None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["exists"], false);
    assert_eq!(body["data"]["writable"], false);
}

#[tokio::test]
async fn admin_gate_blocks_non_admin_sessions() {
    let app = TestApp::new().await;
    let (_, user_token) = app.seed_user("Uplain", false).await;

    let response = app
        .request_with_token(Method::GET, "/api/admin/stats", None, &user_token)
        .await;
    assert_status(&response, StatusCode::FORBIDDEN);

    let (_, admin_token) = app.seed_user("Uboss", true).await;
    let allowed = app
        .request_with_token(Method::GET, "/api/admin/stats", None, &admin_token)
        .await;
    assert_status(&allowed, StatusCode::OK);
}
