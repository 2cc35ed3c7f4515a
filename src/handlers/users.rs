use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AdminUser, entities::user, ApiResponse, ApiResult, AppState, ListQuery,
    PaginatedResponse,
};

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/:id/role", put(set_role))
}

pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<user::Model>> {
    let (users, total) = state
        .services
        .users
        .list(pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        users,
        total,
        &pagination,
    ))))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SetRoleRequest {
    pub is_admin: bool,
}

/// Grant or revoke back-office access
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = crate::ApiResponse<user::Model>),
        (status = 404, description = "Unknown user", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Users"
)]
pub async fn set_role(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRoleRequest>,
) -> ApiResult<user::Model> {
    let updated = state.services.users.set_admin(id, payload.is_admin).await?;
    Ok(Json(ApiResponse::success(updated)))
}
