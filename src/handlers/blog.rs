use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::{blog_category, blog_post},
    errors::ServiceError,
    services::blog::{
        CreateBlogCategoryRequest, CreateBlogPostRequest, UpdateBlogCategoryRequest,
        UpdateBlogPostRequest,
    },
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// Public storefront routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/:slug", get(get_post))
}

/// Public blog-category routes
pub fn category_routes() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_posts))
        .route("/", post(create_post))
        .route("/:id", put(update_post))
        .route("/:id", delete(delete_post))
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category))
        .route("/categories/:id", delete(delete_category))
}

#[derive(Debug, Default, Deserialize)]
struct BlogListQuery {
    category: Option<String>,
}

/// Published blog posts, newest first
#[utoipa::path(
    get,
    path = "/api/blog",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("limit" = Option<u64>, Query, description = "Items per page"),
        ("category" = Option<String>, Query, description = "Blog category slug")
    ),
    responses(
        (status = 200, description = "Published posts", body = crate::ApiResponse<PaginatedResponse<blog_post::Model>>)
    ),
    tag = "Blog"
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
    Query(query): Query<BlogListQuery>,
) -> ApiResult<PaginatedResponse<blog_post::Model>> {
    let (posts, total) = state
        .services
        .blog
        .list_published(query.category.as_deref(), pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        posts,
        total,
        &pagination,
    ))))
}

/// Fetch a published post; reading it increments the view counter
#[utoipa::path(
    get,
    path = "/api/blog/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Post", body = crate::ApiResponse<blog_post::Model>),
        (status = 404, description = "Unknown or unpublished post", body = crate::errors::ErrorResponse)
    ),
    tag = "Blog"
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<blog_post::Model> {
    let post = state.services.blog.get_published_by_slug(&slug).await?;
    Ok(Json(ApiResponse::success(post)))
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> ApiResult<Vec<blog_category::Model>> {
    let categories = state.services.blog.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

pub async fn admin_list_posts(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(pagination): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<blog_post::Model>> {
    let (posts, total) = state
        .services
        .blog
        .list_all(pagination.page, pagination.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        posts,
        total,
        &pagination,
    ))))
}

#[utoipa::path(
    post,
    path = "/api/admin/blog",
    request_body = CreateBlogPostRequest,
    responses(
        (status = 200, description = "Post created", body = crate::ApiResponse<blog_post::Model>),
        (status = 409, description = "Slug already in use", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Blog"
)]
pub async fn create_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBlogPostRequest>,
) -> ApiResult<blog_post::Model> {
    let created = state.services.blog.create_post(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBlogPostRequest>,
) -> ApiResult<blog_post::Model> {
    let updated = state.services.blog.update_post(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_post(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.blog.delete_post(id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn create_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBlogCategoryRequest>,
) -> ApiResult<blog_category::Model> {
    let created = state.services.blog.create_category(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn update_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBlogCategoryRequest>,
) -> ApiResult<blog_category::Model> {
    let updated = state.services.blog.update_category(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.blog.delete_category(id).await?;
    Ok(Json(ApiResponse::success(())))
}
