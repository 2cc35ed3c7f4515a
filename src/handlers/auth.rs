use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{auth::AuthUser, entities::user, ApiResponse, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/line", post(line_sign_in))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LineSignInRequest {
    /// LINE access token obtained by the LIFF frontend
    pub access_token: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: user::Model,
}

/// Sign in with a LINE access token.
///
/// The token is verified against the LINE profile endpoint; the matching
/// account is created or refreshed, and a session JWT is returned.
#[utoipa::path(
    post,
    path = "/api/auth/line",
    request_body = LineSignInRequest,
    responses(
        (status = 200, description = "Session issued", body = crate::ApiResponse<SessionResponse>),
        (status = 401, description = "LINE rejected the token", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn line_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<LineSignInRequest>,
) -> ApiResult<SessionResponse> {
    let profile = state.services.line.get_profile(&payload.access_token).await?;
    let user = state.services.users.upsert_from_line(&profile).await?;
    let token = state.auth.issue_token(&user)?;

    Ok(Json(ApiResponse::success(SessionResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.token_lifetime_secs(),
        user,
    })))
}

/// Introspect the current session
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = crate::ApiResponse<user::Model>),
        (status = 401, description = "No valid session", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Auth"
)]
pub async fn me(user: AuthUser, State(state): State<AppState>) -> ApiResult<user::Model> {
    let model = state.services.users.get(user.user_id).await?;
    Ok(Json(ApiResponse::success(model)))
}
