use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::payment_notification::{self, PaymentNotificationStatus},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/status", put(set_status))
}

#[derive(Debug, Default, Deserialize)]
struct NotificationListQuery {
    status: Option<PaymentNotificationStatus>,
}

pub async fn list_notifications(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
    Query(query): Query<NotificationListQuery>,
) -> ApiResult<PaginatedResponse<payment_notification::Model>> {
    let (rows, total) = state
        .services
        .notifications
        .list(query.status, pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        rows,
        total,
        &pagination,
    ))))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SetNotificationStatusRequest {
    pub status: PaymentNotificationStatus,
    pub note: Option<String>,
}

/// Approve or reject a submitted payment.
///
/// Approving a pending notification confirms the linked order and pushes the
/// customer receipt; repeating the call changes nothing further.
#[utoipa::path(
    put,
    path = "/api/admin/payment-notifications/{id}/status",
    params(("id" = Uuid, Path, description = "Notification id")),
    request_body = SetNotificationStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::ApiResponse<payment_notification::Model>),
        (status = 404, description = "Unknown notification", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Payments"
)]
pub async fn set_status(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetNotificationStatusRequest>,
) -> ApiResult<payment_notification::Model> {
    let updated = state
        .services
        .notifications
        .set_status(id, payload.status, payload.note)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
