use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::shipping_option,
    errors::ServiceError,
    services::shipping::{CreateShippingOptionRequest, UpdateShippingOptionRequest},
    ApiResponse, ApiResult, AppState,
};

/// Public storefront routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_options))
}

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_options))
        .route("/", post(create_option))
        .route("/:id", put(update_option))
        .route("/:id", delete(delete_option))
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutShippingQuery {
    /// Set when the cart contains live animals
    #[serde(default)]
    has_pets: bool,
}

/// Delivery options available at checkout
#[utoipa::path(
    get,
    path = "/api/shipping-options",
    params(("has_pets" = Option<bool>, Query, description = "Cart contains live animals")),
    responses(
        (status = 200, description = "Available options", body = crate::ApiResponse<Vec<shipping_option::Model>>)
    ),
    tag = "Shipping"
)]
pub async fn list_options(
    State(state): State<AppState>,
    Query(query): Query<CheckoutShippingQuery>,
) -> ApiResult<Vec<shipping_option::Model>> {
    let options = state
        .services
        .shipping
        .list_for_checkout(query.has_pets)
        .await?;
    Ok(Json(ApiResponse::success(options)))
}

pub async fn list_all_options(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> ApiResult<Vec<shipping_option::Model>> {
    let options = state.services.shipping.list_all().await?;
    Ok(Json(ApiResponse::success(options)))
}

#[utoipa::path(
    post,
    path = "/api/admin/shipping-options",
    request_body = CreateShippingOptionRequest,
    responses(
        (status = 200, description = "Option created", body = crate::ApiResponse<shipping_option::Model>)
    ),
    security(("Bearer" = [])),
    tag = "Shipping"
)]
pub async fn create_option(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateShippingOptionRequest>,
) -> ApiResult<shipping_option::Model> {
    let created = state.services.shipping.create(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update_option(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShippingOptionRequest>,
) -> ApiResult<shipping_option::Model> {
    let updated = state.services.shipping.update(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_option(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.shipping.delete(id).await?;
    Ok(Json(ApiResponse::success(())))
}
