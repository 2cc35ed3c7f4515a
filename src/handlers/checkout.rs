use axum::{extract::State, routing::post, Json, Router};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use tracing::warn;

use crate::{
    entities::{
        discount_code,
        order::OrderStatus,
        product::Entity as ProductEntity,
    },
    errors::ServiceError,
    services::payments::CheckoutSession,
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/session", post(create_checkout_session))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateCheckoutSessionRequest {
    pub order_number: String,
}

/// Create a Stripe Checkout Session for an order.
///
/// Only orders still awaiting payment can start a card checkout. Applied
/// discount codes are mirrored as a Stripe coupon so the hosted page shows
/// the same total the storefront computed. The order moves to
/// PAYMENT_PENDING; the webhook moves it on from there.
#[utoipa::path(
    post,
    path = "/api/checkout/session",
    request_body = CreateCheckoutSessionRequest,
    responses(
        (status = 200, description = "Session created", body = crate::ApiResponse<CheckoutSession>),
        (status = 400, description = "Order is not awaiting payment", body = crate::errors::ErrorResponse),
        (status = 402, description = "Stripe rejected the request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutSessionRequest>,
) -> ApiResult<CheckoutSession> {
    let found = state
        .services
        .orders
        .get_order_by_number(&payload.order_number)
        .await?;

    match found.order.status().ok() {
        Some(OrderStatus::Pending) | Some(OrderStatus::PaymentPending) => {}
        _ => {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is not awaiting payment",
                found.order.order_number
            )))
        }
    }

    // Items go to Stripe with their product names.
    let mut named_items = Vec::with_capacity(found.items.len());
    for item in &found.items {
        let name = ProductEntity::find_by_id(item.product_id)
            .one(&*state.db)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| "Item".to_string());
        named_items.push((item.clone(), name));
    }

    // Mirror an applied discount code as a Stripe coupon; checkout still
    // works without it if coupon creation fails, the hosted page just shows
    // the undiscounted line items.
    let coupon_id = match &found.order.discount_code {
        Some(code) => {
            let model = discount_code::Entity::find()
                .filter(discount_code::Column::Code.eq(code.clone()))
                .one(&*state.db)
                .await?;
            match model {
                Some(model) => match state.services.stripe.create_coupon(&model).await {
                    Ok(id) => Some(id),
                    Err(err) => {
                        warn!(code = %code, error = %err, "Failed to mirror discount as Stripe coupon");
                        None
                    }
                },
                None => None,
            }
        }
        None => None,
    };

    let session = state
        .services
        .stripe
        .create_checkout_session(&found.order, &named_items, coupon_id.as_deref())
        .await?;

    state
        .services
        .orders
        .update_status(found.order.id, OrderStatus::PaymentPending)
        .await?;

    Ok(Json(ApiResponse::success(session)))
}
