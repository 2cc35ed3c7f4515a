use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::util::ServiceExt;
use uuid::Uuid;

use petshop_api::{
    auth::AuthService,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{category, discount_code, product, shipping_option, user},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};

const TEST_JWT_SECRET: &str =
    "integration_test_jwt_secret_value_with_plenty_of_entropy_0123456789abcdef";

/// Helper harness for spinning up an application backed by an in-memory
/// SQLite database. External HTTP (Stripe, LINE) is pointed at wiremock
/// servers by adjusting the config in `with_config`.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        // Outbound pushes are disabled unless a test opts in with a mock URL.
        cfg.line.push_enabled = false;
        adjust(&mut cfg);

        // A single connection keeps the in-memory database shared.
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("database");
        db::run_migrations(&pool).await.expect("migrations");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let services = AppServices::new(db_arc.clone(), &cfg, event_sender.clone());
        let event_task = tokio::spawn(events::process_events(event_rx, None, None));

        let auth = AuthService::new(cfg.jwt_secret.clone(), cfg.jwt_expiration);

        let state = AppState {
            db: db_arc,
            config: cfg,
            auth,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api", petshop_api::api_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        self.request_inner(method, uri, body, None).await
    }

    pub async fn request_with_token(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: &str,
    ) -> Response<Body> {
        self.request_inner(method, uri, body, Some(token)).await
    }

    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    async fn request_inner(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = builder
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .expect("request");

        self.router.clone().oneshot(request).await.expect("response")
    }

    // ---- fixtures ----

    pub async fn seed_category(&self, key: &str) -> category::Model {
        category::ActiveModel {
            id: Set(Uuid::new_v4()),
            key: Set(key.to_string()),
            name: Set(format!("Category {}", key)),
            icon: Set(None),
            description: Set(None),
            animal_type: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category")
    }

    pub async fn seed_product(
        &self,
        category_key: &str,
        name: &str,
        price: Decimal,
        stock: i32,
    ) -> product::Model {
        self.seed_product_of_type(category_key, name, price, stock, None)
            .await
    }

    pub async fn seed_product_of_type(
        &self,
        category_key: &str,
        name: &str,
        price: Decimal,
        stock: i32,
        product_type: Option<&str>,
    ) -> product::Model {
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            sale_price: Set(None),
            discount_percent: Set(None),
            category: Set(category_key.to_string()),
            category_id: Set(None),
            stock: Set(stock),
            product_type: Set(product_type.map(str::to_string)),
            animal_type: Set(None),
            size: Set(None),
            weight: Set(None),
            dimensions: Set(None),
            material: Set(None),
            brand: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_shipping_option(&self, name: &str, price: Decimal) -> shipping_option::Model {
        shipping_option::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            price: Set(price),
            estimated_days: Set(Some("1-2".to_string())),
            method: Set(Some("courier".to_string())),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed shipping option")
    }

    pub async fn seed_discount_code(
        &self,
        code: &str,
        discount_type: discount_code::DiscountType,
        value: Decimal,
        usage_limit: Option<i32>,
        min_amount: Option<Decimal>,
    ) -> discount_code::Model {
        discount_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            discount_type: Set(discount_type.to_string()),
            value: Set(value),
            min_amount: Set(min_amount),
            max_discount: Set(None),
            usage_limit: Set(usage_limit),
            usage_count: Set(0),
            valid_from: Set(None),
            valid_until: Set(None),
            description: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed discount code")
    }

    pub async fn seed_user(&self, line_user_id: &str, is_admin: bool) -> (user::Model, String) {
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            line_user_id: Set(line_user_id.to_string()),
            display_name: Set("Test User".to_string()),
            picture_url: Set(None),
            email: Set(None),
            is_admin: Set(is_admin),
            last_login_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");

        let token = self.state.auth.issue_token(&model).expect("token");
        (model, token)
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "unexpected status for response"
    );
}
