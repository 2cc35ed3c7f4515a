use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::discount_code,
    errors::ServiceError,
    services::discounts::{CreateDiscountCodeRequest, DiscountQuote, UpdateDiscountCodeRequest},
    ApiResponse, ApiResult, AppState,
};

/// Public storefront routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/validate", post(validate_code))
}

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_codes))
        .route("/", post(create_code))
        .route("/:id", put(update_code))
        .route("/:id", delete(delete_code))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ValidateCodeRequest {
    pub code: String,
    /// Order subtotal the code would apply to
    pub subtotal: Decimal,
}

/// Validate a discount code against an order subtotal
#[utoipa::path(
    post,
    path = "/api/discount-codes/validate",
    request_body = ValidateCodeRequest,
    responses(
        (status = 200, description = "Code applies; computed discount", body = crate::ApiResponse<DiscountQuote>),
        (status = 400, description = "Code does not apply", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown code", body = crate::errors::ErrorResponse)
    ),
    tag = "Discounts"
)]
pub async fn validate_code(
    State(state): State<AppState>,
    Json(payload): Json<ValidateCodeRequest>,
) -> ApiResult<DiscountQuote> {
    let (_, quote) = state
        .services
        .discounts
        .validate_code(&payload.code, payload.subtotal)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn list_codes(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(pagination): Query<crate::ListQuery>,
) -> ApiResult<crate::PaginatedResponse<discount_code::Model>> {
    let (codes, total) = state
        .services
        .discounts
        .list(pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(crate::PaginatedResponse::new(
        codes,
        total,
        &pagination,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/admin/discount-codes",
    request_body = CreateDiscountCodeRequest,
    responses(
        (status = 200, description = "Code created", body = crate::ApiResponse<discount_code::Model>),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Discounts"
)]
pub async fn create_code(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateDiscountCodeRequest>,
) -> ApiResult<discount_code::Model> {
    let created = state.services.discounts.create(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update_code(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDiscountCodeRequest>,
) -> ApiResult<discount_code::Model> {
    let updated = state.services.discounts.update(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_code(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.discounts.delete(id).await?;
    Ok(Json(ApiResponse::success(())))
}
