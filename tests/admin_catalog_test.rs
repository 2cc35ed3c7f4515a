//! Integration tests for the admin CRUD surfaces: categories, products,
//! shipping options, blog posts, and payment-notification review.

mod common;

use axum::http::{Method, StatusCode};
use common::{assert_status, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn category_and_product_crud_round_trip() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    // Create a category.
    let category = response_json(
        app.request_with_token(
            Method::POST,
            "/api/admin/categories",
            Some(json!({
                "key": "aquatics",
                "name": "Aquatics",
                "icon": "🐠",
                "sort_order": 3
            })),
            &admin_token,
        )
        .await,
    )
    .await;
    assert_eq!(category["data"]["key"], "aquatics");
    let category_id = category["data"]["id"].as_str().unwrap().to_string();

    // Duplicate keys are a conflict.
    let duplicate = app
        .request_with_token(
            Method::POST,
            "/api/admin/categories",
            Some(json!({"key": "aquatics", "name": "Aquatics again"})),
            &admin_token,
        )
        .await;
    assert_status(&duplicate, StatusCode::CONFLICT);

    // Create a product with images in that category.
    let product = response_json(
        app.request_with_token(
            Method::POST,
            "/api/admin/products",
            Some(json!({
                "name": "Fish Tank 60L",
                "price": "1290",
                "category": "aquatics",
                "stock": 7,
                "images": [
                    {"url": "/uploads/images/tank-front.jpg", "is_main": true},
                    {"url": "/uploads/images/tank-side.jpg"}
                ]
            })),
            &admin_token,
        )
        .await,
    )
    .await;
    let product_id = product["data"]["id"].as_str().unwrap().to_string();
    let images = product["data"]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["is_main"], true);

    // The storefront sees it.
    let listing = response_json(
        app.request(Method::GET, "/api/products?category=aquatics", None)
            .await,
    )
    .await;
    assert_eq!(listing["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(listing["data"]["total"], 1);

    // Deactivate it; the storefront listing empties, the admin one does not.
    app.request_with_token(
        Method::PUT,
        &format!("/api/admin/products/{}", product_id),
        Some(json!({"is_active": false})),
        &admin_token,
    )
    .await;

    let listing = response_json(
        app.request(Method::GET, "/api/products?category=aquatics", None)
            .await,
    )
    .await;
    assert_eq!(listing["data"]["items"].as_array().unwrap().len(), 0);

    let admin_listing = response_json(
        app.request_with_token(
            Method::GET,
            "/api/admin/products?category=aquatics",
            None,
            &admin_token,
        )
        .await,
    )
    .await;
    assert_eq!(admin_listing["data"]["items"].as_array().unwrap().len(), 1);

    // Deleting the category detaches, not deletes, the product.
    let deleted = app
        .request_with_token(
            Method::DELETE,
            &format!("/api/admin/categories/{}", category_id),
            None,
            &admin_token,
        )
        .await;
    assert_status(&deleted, StatusCode::OK);

    let still_there = app
        .request(Method::GET, &format!("/api/products/{}", product_id), None)
        .await;
    assert_status(&still_there, StatusCode::OK);
}

#[tokio::test]
async fn shipping_options_respect_the_pet_filter() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    for (name, pets_only) in [("Standard", false), ("Live Animal Transport", true)] {
        let response = app
            .request_with_token(
                Method::POST,
                "/api/admin/shipping-options",
                Some(json!({
                    "name": name,
                    "price": "80",
                    "for_pets_only": pets_only
                })),
                &admin_token,
            )
            .await;
        assert_status(&response, StatusCode::OK);
    }

    let plain = response_json(app.request(Method::GET, "/api/shipping-options", None).await).await;
    assert_eq!(plain["data"].as_array().unwrap().len(), 1);

    let with_pets = response_json(
        app.request(Method::GET, "/api/shipping-options?has_pets=true", None)
            .await,
    )
    .await;
    assert_eq!(with_pets["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn blog_posts_publish_slugs_and_count_views() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    let post = response_json(
        app.request_with_token(
            Method::POST,
            "/api/admin/blog",
            Some(json!({
                "title": "Feeding Your Puppy 101",
                "content": "Start with small portions...",
                "tags": ["dogs", "nutrition"],
                "is_published": true
            })),
            &admin_token,
        )
        .await,
    )
    .await;
    assert_eq!(post["data"]["slug"], "feeding-your-puppy-101");

    // Drafts stay invisible on the storefront.
    app.request_with_token(
        Method::POST,
        "/api/admin/blog",
        Some(json!({
            "title": "Unfinished draft",
            "content": "...",
            "is_published": false
        })),
        &admin_token,
    )
    .await;

    let listing = response_json(app.request(Method::GET, "/api/blog", None).await).await;
    assert_eq!(listing["data"]["items"].as_array().unwrap().len(), 1);

    // Reading bumps the view counter.
    let first_read = response_json(
        app.request(Method::GET, "/api/blog/feeding-your-puppy-101", None)
            .await,
    )
    .await;
    assert_eq!(first_read["data"]["view_count"], 1);

    let second_read = response_json(
        app.request(Method::GET, "/api/blog/feeding-your-puppy-101", None)
            .await,
    )
    .await;
    assert_eq!(second_read["data"]["view_count"], 2);

    let missing = app
        .request(Method::GET, "/api/blog/unfinished-draft", None)
        .await;
    assert_status(&missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn approving_a_transfer_slip_confirms_the_order_once() {
    let app = TestApp::new().await;
    let (_, admin_token) = app.seed_user("Uadmin", true).await;

    app.seed_category("food").await;
    let product = app.seed_product("food", "Bird Seed", dec!(150), 5).await;
    let shipping = app.seed_shipping_option("Courier", dec!(40)).await;

    let order = response_json(
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
    let order_id = order["data"]["id"].as_str().unwrap().to_string();
    let order_number = order["data"]["order_number"].as_str().unwrap().to_string();

    // Record a manual transfer notification directly through the service, the
    // way the slip-upload endpoint does.
    let notification = app
        .state
        .services
        .notifications
        .record_transfer_slip(
            order_id.parse().unwrap(),
            dec!(190),
            chrono::Utc::now(),
            "slip-1.jpg".to_string(),
            "/uploads/slips/slip-1.jpg".to_string(),
        )
        .await
        .expect("record slip");
    assert_eq!(notification.status, "PENDING");

    // Approve it; the order confirms.
    let approved = app
        .request_with_token(
            Method::PUT,
            &format!("/api/admin/payment-notifications/{}/status", notification.id),
            Some(json!({"status": "APPROVED"})),
            &admin_token,
        )
        .await;
    assert_status(&approved, StatusCode::OK);

    let order = response_json(
        app.request(Method::GET, &format!("/api/orders/{}", order_number), None)
            .await,
    )
    .await;
    assert_eq!(order["data"]["status"], "CONFIRMED");

    // Approving again changes nothing and does not error.
    let again = app
        .request_with_token(
            Method::PUT,
            &format!("/api/admin/payment-notifications/{}/status", notification.id),
            Some(json!({"status": "APPROVED"})),
            &admin_token,
        )
        .await;
    assert_status(&again, StatusCode::OK);
}
