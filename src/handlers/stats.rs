use axum::{extract::State, routing::get, Json, Router};

use crate::{auth::AdminUser, services::stats::DashboardStats, ApiResponse, ApiResult, AppState};

/// Admin back-office routes
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/", get(dashboard))
}

/// Dashboard counters for the back office
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Dashboard stats", body = crate::ApiResponse<DashboardStats>)
    ),
    security(("Bearer" = [])),
    tag = "Admin"
)]
pub async fn dashboard(_admin: AdminUser, State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let stats = state.services.stats.dashboard().await?;
    Ok(Json(ApiResponse::success(stats)))
}
