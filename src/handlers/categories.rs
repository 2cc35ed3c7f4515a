use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::category,
    errors::ServiceError,
    services::catalog::{CreateCategoryRequest, UpdateCategoryRequest},
    ApiResponse, ApiResult, AppState,
};

/// Public storefront routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/:key", get(get_category))
}

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_categories))
        .route("/", post(create_category))
        .route("/:id", put(update_category))
        .route("/:id", delete(delete_category))
}

/// List active categories for the storefront
#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Active categories", body = crate::ApiResponse<Vec<category::Model>>)
    ),
    tag = "Categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.catalog.list_categories(false).await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    get,
    path = "/api/categories/{key}",
    params(("key" = String, Path, description = "Category key")),
    responses(
        (status = 200, description = "Category", body = crate::ApiResponse<category::Model>),
        (status = 404, description = "Unknown category", body = crate::errors::ErrorResponse)
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<category::Model> {
    let category = state.services.catalog.get_category_by_key(&key).await?;
    Ok(Json(ApiResponse::success(category)))
}

pub async fn list_all_categories(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.catalog.list_categories(true).await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 200, description = "Category created", body = crate::ApiResponse<category::Model>),
        (status = 409, description = "Key already in use", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiResult<category::Model> {
    let created = state.services.catalog.create_category(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<category::Model> {
    let updated = state.services.catalog.update_category(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    Ok(Json(ApiResponse::success(())))
}
