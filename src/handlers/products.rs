use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::product_image,
    errors::ServiceError,
    services::catalog::{
        CreateProductRequest, NewProductImage, ProductFilter, ProductWithImages,
        UpdateProductRequest,
    },
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// Public storefront routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_products))
        .route("/", post(create_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .route("/:id/images", post(add_product_image))
        .route("/images/:image_id/main", put(set_main_image))
        .route("/images/:image_id", delete(delete_product_image))
}

/// List products for the storefront
#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
        ("category" = Option<String>, Query, description = "Category key filter"),
        ("animal_type" = Option<String>, Query, description = "Animal type filter"),
        ("search" = Option<String>, Query, description = "Name/description search")
    ),
    responses(
        (status = 200, description = "Products page", body = crate::ApiResponse<PaginatedResponse<ProductWithImages>>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
    Query(mut filter): Query<ProductFilter>,
) -> ApiResult<PaginatedResponse<ProductWithImages>> {
    // Storefront listings never expose inactive products.
    filter.active_only = Some(true);
    if filter.search.is_none() {
        filter.search = pagination.search.clone();
    }

    let (items, total) = state
        .services
        .catalog
        .list_products(&filter, pagination.page, pagination.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        &pagination,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product with images", body = crate::ApiResponse<ProductWithImages>),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductWithImages> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

pub async fn admin_list_products(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
    Query(mut filter): Query<ProductFilter>,
) -> ApiResult<PaginatedResponse<ProductWithImages>> {
    filter.active_only = Some(false);
    let (items, total) = state
        .services
        .catalog
        .list_products(&filter, pagination.page, pagination.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        &pagination,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Product created", body = crate::ApiResponse<ProductWithImages>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> ApiResult<ProductWithImages> {
    let created = state.services.catalog.create_product(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<ProductWithImages> {
    let updated = state.services.catalog.update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_product(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn add_product_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewProductImage>,
) -> ApiResult<product_image::Model> {
    let image = state.services.catalog.add_product_image(id, payload).await?;
    Ok(Json(ApiResponse::success(image)))
}

pub async fn set_main_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<product_image::Model> {
    let image = state.services.catalog.set_main_image(image_id).await?;
    Ok(Json(ApiResponse::success(image)))
}

pub async fn delete_product_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_product_image(image_id).await?;
    Ok(Json(ApiResponse::success(())))
}
