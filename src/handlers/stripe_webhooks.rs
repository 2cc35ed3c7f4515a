use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    entities::{
        order::{self, Entity as OrderEntity, OrderStatus},
        payment_notification::PaymentNotificationStatus,
    },
    errors::ServiceError,
    events::Event,
    AppState,
};

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<AppState> {
    Router::new().route("/stripe", post(stripe_webhook))
}

/// Stripe webhook endpoint.
///
/// Handles `payment_intent.succeeded`, `checkout.session.completed` and
/// `payment_intent.payment_failed`. Status updates are transition-guarded and
/// the payment record is keyed by the Stripe object id, so duplicate
/// deliveries of the same event change nothing and push no second receipt.
#[utoipa::path(
    post,
    path = "/api/webhooks/stripe",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    if let Some(secret) = &state.config.stripe.webhook_secret {
        let tolerance = state.config.stripe.webhook_tolerance_secs;
        if !verify_signature(&headers, &body, secret, tolerance) {
            warn!("Stripe webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let event: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("invalid json: {}", e)))?;

    let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
    let object = event
        .pointer("/data/object")
        .cloned()
        .unwrap_or(Value::Null);

    match event_type {
        "payment_intent.succeeded" => {
            let key = object_key("stripe-payment", &object)?;
            let amount = minor_units_amount(&object, &["amount_received", "amount"]);
            handle_payment_succeeded(&state, &object, key, amount).await?;
        }
        "checkout.session.completed" => {
            let key = object_key("stripe-session", &object)?;
            let amount = minor_units_amount(&object, &["amount_total"]);
            handle_payment_succeeded(&state, &object, key, amount).await?;
        }
        "payment_intent.payment_failed" => {
            handle_payment_failed(&state, &object).await?;
        }
        other => {
            info!(event_type = %other, "Unhandled Stripe webhook type");
        }
    }

    Ok((StatusCode::OK, "ok"))
}

async fn handle_payment_succeeded(
    state: &AppState,
    object: &Value,
    event_key: String,
    amount: Decimal,
) -> Result<(), ServiceError> {
    let Some(order_model) = find_order(state, object).await? else {
        warn!(event_key = %event_key, "Stripe event does not reference a known order");
        return Ok(());
    };

    state.services.orders.confirm_paid(order_model.id).await?;

    let created = state
        .services
        .notifications
        .record_payment_event(
            order_model.id,
            &event_key,
            amount,
            PaymentNotificationStatus::Approved,
            Some("Stripe payment".to_string()),
        )
        .await?;

    // The receipt goes out only for the delivery that created the record.
    if created.is_some() {
        state
            .services
            .notifications
            .send_receipt(order_model.id, amount)
            .await;
    }

    Ok(())
}

async fn handle_payment_failed(state: &AppState, object: &Value) -> Result<(), ServiceError> {
    let Some(order_model) = find_order(state, object).await? else {
        warn!("Stripe failure event does not reference a known order");
        return Ok(());
    };

    let reason = object
        .pointer("/last_payment_error/message")
        .and_then(|v| v.as_str())
        .unwrap_or("payment failed")
        .to_string();

    match order_model.status().ok() {
        Some(OrderStatus::Pending) | Some(OrderStatus::PaymentPending) => {
            state
                .services
                .orders
                .update_status(order_model.id, OrderStatus::Cancelled)
                .await?;
        }
        _ => {
            warn!(order_id = %order_model.id, status = %order_model.status, "Payment failure for an order not awaiting payment");
        }
    }

    state
        .event_sender
        .send(Event::PaymentFailed {
            order_id: order_model.id,
            reason,
        })
        .await;

    Ok(())
}

/// Locate the order a Stripe object refers to, via the `order_id` metadata
/// set at session creation, falling back to `client_reference_id`.
async fn find_order(
    state: &AppState,
    object: &Value,
) -> Result<Option<order::Model>, ServiceError> {
    if let Some(order_id) = object
        .pointer("/metadata/order_id")
        .and_then(|v| v.as_str())
        .and_then(|raw| Uuid::parse_str(raw).ok())
    {
        if let Some(found) = OrderEntity::find_by_id(order_id).one(&*state.db).await? {
            return Ok(Some(found));
        }
    }

    if let Some(order_number) = object
        .get("client_reference_id")
        .and_then(|v| v.as_str())
    {
        return Ok(OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*state.db)
            .await?);
    }

    Ok(None)
}

fn object_key(prefix: &str, object: &Value) -> Result<String, ServiceError> {
    let id = object
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ServiceError::BadRequest("event object has no id".to_string()))?;
    Ok(format!("{}-{}", prefix, id))
}

fn minor_units_amount(object: &Value, fields: &[&str]) -> Decimal {
    for field in fields {
        if let Some(minor) = object.get(*field).and_then(|v| v.as_i64()) {
            return Decimal::from(minor) / Decimal::from(100);
        }
    }
    Decimal::ZERO
}

/// Verify a `Stripe-Signature` header: HMAC-SHA256 over `"{t}.{payload}"`
/// with a constant-time compare and a timestamp tolerance window.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    let Some(signature) = headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    else {
        return false;
    };

    let mut timestamp = "";
    let mut v1 = "";
    for part in signature.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => timestamp = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }
    if timestamp.is_empty() || v1.is_empty() {
        return false;
    }

    if let Ok(ts) = timestamp.parse::<i64>() {
        let now = chrono::Utc::now().timestamp();
        if (now - ts).unsigned_abs() > tolerance_secs {
            return false;
        }
    } else {
        return false;
    }

    let signed = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap_or(""));
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, v1)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    /// Build a `Stripe-Signature` header value for a payload, as Stripe would.
    fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let signed = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap_or(""));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(signed.as_bytes());
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        )
    }

    #[test]
    fn valid_signature_passes() {
        let secret = "whsec_test";
        let payload = Bytes::from_static(b"{\"id\":\"evt_1\"}");
        let header = sign_payload(secret, chrono::Utc::now().timestamp(), &payload);

        let mut headers = HeaderMap::new();
        headers.insert("Stripe-Signature", HeaderValue::from_str(&header).unwrap());

        assert!(verify_signature(&headers, &payload, secret, 300));
    }

    #[test]
    fn wrong_secret_or_stale_timestamp_fails() {
        let payload = Bytes::from_static(b"{}");
        let header = sign_payload("whsec_a", chrono::Utc::now().timestamp(), &payload);

        let mut headers = HeaderMap::new();
        headers.insert("Stripe-Signature", HeaderValue::from_str(&header).unwrap());
        assert!(!verify_signature(&headers, &payload, "whsec_b", 300));

        let stale = sign_payload("whsec_a", chrono::Utc::now().timestamp() - 3600, &payload);
        headers.insert("Stripe-Signature", HeaderValue::from_str(&stale).unwrap());
        assert!(!verify_signature(&headers, &payload, "whsec_a", 300));
    }

    #[test]
    fn missing_header_fails() {
        let headers = HeaderMap::new();
        assert!(!verify_signature(
            &headers,
            &Bytes::from_static(b"{}"),
            "whsec",
            300
        ));
    }

    #[test]
    fn amounts_come_back_from_minor_units() {
        let object: Value = serde_json::json!({"amount_received": 45000});
        assert_eq!(
            minor_units_amount(&object, &["amount_received", "amount"]),
            Decimal::from(450)
        );
    }
}
