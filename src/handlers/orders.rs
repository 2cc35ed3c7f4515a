use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{AdminUser, AuthUser},
    entities::order::{self, OrderStatus},
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderFilter, OrderWithItems},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// Public storefront routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        // Path the storefront has always used
        .route("/create", post(create_order))
        .route("/:order_number", get(get_order_by_number))
}

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/:id/status", put(update_order_status))
}

/// Create an order from the storefront checkout.
///
/// Stock decrements, item inserts and the discount usage increment are
/// atomic with the order insert; see the order service for the transaction.
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = crate::ApiResponse<OrderWithItems>),
        (status = 400, description = "Invalid payload or unknown product/shipping option", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateOrderRequest>,
) -> ApiResult<OrderWithItems> {
    payload.user_id = user.map(|u| u.user_id);
    let created = state.services.orders.create_order(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// Look up an order by its number.
///
/// Guest orders are addressable by number alone; orders linked to an account
/// are only visible to their owner or an admin.
#[utoipa::path(
    get,
    path = "/api/orders/{order_number}",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order", body = crate::ApiResponse<OrderWithItems>),
        (status = 403, description = "Order belongs to another account", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_by_number(
    user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<OrderWithItems> {
    let found = state
        .services
        .orders
        .get_order_by_number(&order_number)
        .await?;

    if let Some(owner_id) = found.order.user_id {
        let allowed = user
            .as_ref()
            .map(|u| u.is_admin || u.user_id == owner_id)
            .unwrap_or(false);
        if !allowed {
            return Err(ServiceError::Forbidden(
                "this order belongs to another account".to_string(),
            ));
        }
    }

    Ok(Json(ApiResponse::success(found)))
}

pub async fn admin_list_orders(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let (orders, total) = state
        .services
        .orders
        .list_orders(&filter, pagination.page, pagination.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders,
        total,
        &pagination,
    ))))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[utoipa::path(
    put,
    path = "/api/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::ApiResponse<order::Model>),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let updated = state
        .services
        .orders
        .update_status(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
