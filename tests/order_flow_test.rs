//! Integration tests for the order-creation flow.
//!
//! Covers the atomic order transaction: stock conservation, oversell
//! rejection, discount redemption with usage limits, and the error mapping
//! for bad requests.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status, response_json, TestApp};
use petshop_api::entities::discount_code::DiscountType;
use rust_decimal_macros::dec;
use serde_json::json;

fn order_payload(product_id: &str, quantity: i64, shipping_id: &str) -> serde_json::Value {
    json!({
        "items": [{"product_id": product_id, "quantity": quantity}],
        "customer_name": "Somchai",
        "customer_phone": "0812345678",
        "customer_address": "123 Sukhumvit Rd, Bangkok",
        "shipping_option_id": shipping_id,
    })
}

#[tokio::test]
async fn creating_an_order_decrements_stock_and_snapshots_prices() {
    let app = TestApp::new().await;
    app.seed_category("food").await;
    let product = app
        .seed_product("food", "Puppy Chow", dec!(200), 5)
        .await;
    let shipping = app.seed_shipping_option("Courier", dec!(50)).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(
                &product.id.to_string(),
                2,
                &shipping.id.to_string(),
            )),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;

    assert_eq!(body["success"], true);
    let order = &body["data"];
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total_amount"], "450");
    assert_eq!(order["shipping_fee"], "50");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["price"], "200");

    // Stock went from 5 to 3.
    let product_response = app
        .request(
            Method::GET,
            &format!("/api/products/{}", product.id),
            None,
        )
        .await;
    let product_body = response_json(product_response).await;
    assert_eq!(product_body["data"]["stock"], 3);

    // The order is addressable by its number.
    let order_number = order["order_number"].as_str().unwrap();
    let lookup = app
        .request(Method::GET, &format!("/api/orders/{}", order_number), None)
        .await;
    assert_status(&lookup, StatusCode::OK);
}

#[tokio::test]
async fn exhausting_stock_rejects_the_next_order() {
    let app = TestApp::new().await;
    app.seed_category("food").await;
    let product = app.seed_product("food", "Cat Treats", dec!(100), 2).await;
    let shipping = app.seed_shipping_option("Courier", dec!(0)).await;

    let payload = order_payload(&product.id.to_string(), 2, &shipping.id.to_string());

    let first = app
        .request(Method::POST, "/api/orders", Some(payload.clone()))
        .await;
    assert_status(&first, StatusCode::OK);

    let product_body = response_json(
        app.request(Method::GET, &format!("/api/products/{}", product.id), None)
            .await,
    )
    .await;
    assert_eq!(product_body["data"]["stock"], 0);

    // Identical request now exceeds stock.
    let second = app
        .request(Method::POST, "/api/orders", Some(payload))
        .await;
    assert_status(&second, StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(second).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient stock"));
}

#[tokio::test]
async fn oversell_across_two_orders_is_rejected() {
    let app = TestApp::new().await;
    app.seed_category("toys").await;
    let product = app.seed_product("toys", "Rope Toy", dec!(80), 3).await;
    let shipping = app.seed_shipping_option("Courier", dec!(0)).await;

    // Together these exceed the available 3 units; only one can succeed.
    let first = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(
                &product.id.to_string(),
                2,
                &shipping.id.to_string(),
            )),
        )
        .await;
    let second = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(
                &product.id.to_string(),
                2,
                &shipping.id.to_string(),
            )),
        )
        .await;

    let statuses = [first.status(), second.status()];
    assert!(statuses.contains(&StatusCode::OK));
    assert!(statuses.contains(&StatusCode::UNPROCESSABLE_ENTITY));

    let product_body = response_json(
        app.request(Method::GET, &format!("/api/products/{}", product.id), None)
            .await,
    )
    .await;
    assert_eq!(product_body["data"]["stock"], 1);
}

#[tokio::test]
async fn unknown_product_or_shipping_option_is_a_validation_error() {
    let app = TestApp::new().await;
    app.seed_category("food").await;
    let product = app.seed_product("food", "Bird Seed", dec!(60), 5).await;
    let shipping = app.seed_shipping_option("Courier", dec!(20)).await;

    let ghost = uuid::Uuid::new_v4().to_string();

    let bad_product = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(&ghost, 1, &shipping.id.to_string())),
        )
        .await;
    assert_status(&bad_product, StatusCode::BAD_REQUEST);

    let bad_shipping = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(&product.id.to_string(), 1, &ghost)),
        )
        .await;
    assert_status(&bad_shipping, StatusCode::BAD_REQUEST);

    let empty_items = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [],
                "customer_name": "Somchai",
                "customer_phone": "0812345678",
                "customer_address": "Bangkok",
                "shipping_option_id": shipping.id.to_string(),
            })),
        )
        .await;
    assert_status(&empty_items, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn discount_code_reduces_total_and_burns_one_use() {
    let app = TestApp::new().await;
    app.seed_category("food").await;
    let product = app.seed_product("food", "Dog Food", dec!(500), 10).await;
    let shipping = app.seed_shipping_option("Courier", dec!(50)).await;
    app.seed_discount_code("WELCOME10", DiscountType::Percentage, dec!(10), Some(1), None)
        .await;

    let mut payload = order_payload(&product.id.to_string(), 1, &shipping.id.to_string());
    payload["discount_code"] = json!("WELCOME10");

    let first = app
        .request(Method::POST, "/api/orders", Some(payload.clone()))
        .await;
    assert_status(&first, StatusCode::OK);
    let body = response_json(first).await;
    // 500 - 10% + 50 shipping
    assert_eq!(body["data"]["discount_amount"], "50");
    assert_eq!(body["data"]["total_amount"], "500");
    assert_eq!(body["data"]["discount_code"], "WELCOME10");

    // The single permitted use is burned; the next order is rejected before
    // any stock moves.
    let second = app
        .request(Method::POST, "/api/orders", Some(payload))
        .await;
    assert_status(&second, StatusCode::BAD_REQUEST);
    let message = response_json(second).await["message"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("usage limit"));

    let product_body = response_json(
        app.request(Method::GET, &format!("/api/products/{}", product.id), None)
            .await,
    )
    .await;
    assert_eq!(product_body["data"]["stock"], 9);
}

#[tokio::test]
async fn discount_below_minimum_amount_is_rejected() {
    let app = TestApp::new().await;
    app.seed_category("food").await;
    let product = app.seed_product("food", "Small Treat", dec!(50), 5).await;
    let shipping = app.seed_shipping_option("Courier", dec!(0)).await;
    app.seed_discount_code(
        "BIGSPENDER",
        DiscountType::FixedAmount,
        dec!(100),
        None,
        Some(dec!(300)),
    )
    .await;

    let mut payload = order_payload(&product.id.to_string(), 1, &shipping.id.to_string());
    payload["discount_code"] = json!("BIGSPENDER");

    let response = app
        .request(Method::POST, "/api/orders", Some(payload))
        .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn validate_endpoint_quotes_discounts_without_burning_them() {
    let app = TestApp::new().await;
    app.seed_discount_code("SAVE50", DiscountType::FixedAmount, dec!(50), Some(5), None)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/discount-codes/validate",
            Some(json!({"code": "SAVE50", "subtotal": "400"})),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["discount_amount"], "50");

    let unknown = app
        .request(
            Method::POST,
            "/api/discount-codes/validate",
            Some(json!({"code": "NOPE", "subtotal": "400"})),
        )
        .await;
    assert_status(&unknown, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pet_orders_require_a_deposit_and_pet_couriers_stay_pet_only() {
    let app = TestApp::new().await;
    app.seed_category("pets").await;
    let pet = app
        .seed_product_of_type("pets", "Holland Lop", dec!(3000), 2, Some("pet"))
        .await;
    let normal_shipping = app.seed_shipping_option("Courier", dec!(0)).await;

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(
                &pet.id.to_string(),
                1,
                &normal_shipping.id.to_string(),
            )),
        )
        .await;
    assert_status(&response, StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["has_pets"], true);
    assert_eq!(body["data"]["requires_deposit"], true);
    assert_eq!(body["data"]["payment_type"], "DEPOSIT");
    assert_eq!(body["data"]["deposit_amount"], "1500.00");

    // A pets-only courier cannot be used for a pet-free order.
    app.seed_category("food").await;
    let food = app.seed_product("food", "Kibble", dec!(100), 5).await;
    let pet_shipping = {
        use sea_orm::{ActiveModelTrait, Set};
        petshop_api::entities::shipping_option::ActiveModel {
            id: Set(uuid::Uuid::new_v4()),
            name: Set("Live Animal Transport".to_string()),
            description: Set(None),
            price: Set(dec!(200)),
            estimated_days: Set(Some("1".to_string())),
            method: Set(Some("pet-courier".to_string())),
            for_pets_only: Set(true),
            ..Default::default()
        }
        .insert(&*app.state.db)
        .await
        .expect("seed pet shipping")
    };

    let rejected = app
        .request(
            Method::POST,
            "/api/orders",
            Some(order_payload(
                &food.id.to_string(),
                1,
                &pet_shipping.id.to_string(),
            )),
        )
        .await;
    assert_status(&rejected, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_can_walk_an_order_through_statuses() {
    let app = TestApp::new().await;
    app.seed_category("food").await;
    let product = app.seed_product("food", "Hay Bale", dec!(120), 4).await;
    let shipping = app.seed_shipping_option("Courier", dec!(30)).await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    let created = response_json(
        app.request(
            Method::POST,
            "/api/orders",
            Some(order_payload(
                &product.id.to_string(),
                1,
                &shipping.id.to_string(),
            )),
        )
        .await,
    )
    .await;
    let order_id = created["data"]["id"].as_str().unwrap().to_string();

    let updated = app
        .request_with_token(
            Method::PUT,
            &format!("/api/admin/orders/{}/status", order_id),
            Some(json!({"status": "CONFIRMED"})),
            &admin_token,
        )
        .await;
    assert_status(&updated, StatusCode::OK);
    assert_eq!(response_json(updated).await["data"]["status"], "CONFIRMED");

    // Without an admin token the endpoint is closed.
    let anonymous = app
        .request(
            Method::PUT,
            &format!("/api/admin/orders/{}/status", order_id),
            Some(json!({"status": "SHIPPED"})),
        )
        .await;
    assert_status(&anonymous, StatusCode::UNAUTHORIZED);
}
