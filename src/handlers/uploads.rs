use axum::{
    extract::{Multipart, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path as FsPath, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    entities::payment_notification,
    errors::ServiceError,
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment-slip", post(upload_payment_slip))
        .route("/health", get(uploads_health))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/image", post(upload_image))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadedFile {
    pub filename: String,
    pub url: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadsHealth {
    pub upload_dir: String,
    pub exists: bool,
    pub writable: bool,
}

/// Keep only the final path component and drop anything that could escape
/// the upload directory.
fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("file");
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

async fn save_upload(
    dir: &FsPath,
    original_name: &str,
    data: &[u8],
) -> Result<String, ServiceError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ServiceError::InternalError(format!("failed to create upload dir: {}", e)))?;

    let sanitized = sanitize_filename(original_name);
    let filename = if sanitized.is_empty() {
        format!("{}", Uuid::new_v4())
    } else {
        format!("{}-{}", Uuid::new_v4(), sanitized)
    };

    let path = dir.join(&filename);
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ServiceError::InternalError(format!("failed to store upload: {}", e)))?;

    Ok(filename)
}

fn public_url(state: &AppState, segment: &str, filename: &str) -> String {
    let path = format!("/uploads/{}/{}", segment, filename);
    match &state.config.public_base_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
        None => path,
    }
}

/// Upload a bank-transfer slip for an order.
///
/// Multipart fields: `order_number`, `amount`, and the slip `file`. Creates a
/// pending payment notification for admin review.
#[utoipa::path(
    post,
    path = "/api/uploads/payment-slip",
    responses(
        (status = 200, description = "Slip stored, notification pending review", body = crate::ApiResponse<payment_notification::Model>),
        (status = 400, description = "Missing field or unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Uploads"
)]
pub async fn upload_payment_slip(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<payment_notification::Model> {
    let mut order_number: Option<String> = None;
    let mut amount: Option<Decimal> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "order_number" => {
                order_number = Some(field.text().await.map_err(|e| {
                    ServiceError::BadRequest(format!("invalid order_number field: {}", e))
                })?);
            }
            "amount" => {
                let raw = field.text().await.map_err(|e| {
                    ServiceError::BadRequest(format!("invalid amount field: {}", e))
                })?;
                amount = Some(raw.parse().map_err(|_| {
                    ServiceError::ValidationError("amount must be a decimal number".to_string())
                })?);
            }
            "file" => {
                let name = field.file_name().unwrap_or("slip").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ServiceError::BadRequest(format!("failed reading upload: {}", e))
                })?;
                if data.len() > state.config.max_upload_bytes {
                    return Err(ServiceError::ValidationError(
                        "uploaded file is too large".to_string(),
                    ));
                }
                file = Some((name, data.to_vec()));
            }
            other => {
                warn!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let order_number = order_number
        .ok_or_else(|| ServiceError::ValidationError("order_number is required".to_string()))?;
    let amount =
        amount.ok_or_else(|| ServiceError::ValidationError("amount is required".to_string()))?;
    let (original_name, data) =
        file.ok_or_else(|| ServiceError::ValidationError("file is required".to_string()))?;

    let found = state
        .services
        .orders
        .get_order_by_number(&order_number)
        .await?;

    let dir = PathBuf::from(&state.config.upload_dir).join("slips");
    let filename = save_upload(&dir, &original_name, &data).await?;
    let url = public_url(&state, "slips", &filename);

    let notification = state
        .services
        .notifications
        .record_transfer_slip(found.order.id, amount, Utc::now(), filename, url)
        .await?;

    info!(order_number = %order_number, "Payment slip uploaded");
    Ok(Json(ApiResponse::success(notification)))
}

/// Upload a product or blog image (admin)
#[utoipa::path(
    post,
    path = "/api/admin/uploads/image",
    responses(
        (status = 200, description = "Image stored", body = crate::ApiResponse<UploadedFile>),
        (status = 400, description = "No file in request", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Uploads"
)]
pub async fn upload_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<UploadedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("image").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ServiceError::BadRequest(format!("failed reading upload: {}", e)))?;
            if data.len() > state.config.max_upload_bytes {
                return Err(ServiceError::ValidationError(
                    "uploaded file is too large".to_string(),
                ));
            }

            let dir = PathBuf::from(&state.config.upload_dir).join("images");
            let filename = save_upload(&dir, &name, &data).await?;
            let url = public_url(&state, "images", &filename);

            return Ok(Json(ApiResponse::success(UploadedFile { filename, url })));
        }
    }

    Err(ServiceError::ValidationError(
        "file field is required".to_string(),
    ))
}

/// Report whether the upload directory exists and is writable
#[utoipa::path(
    get,
    path = "/api/uploads/health",
    responses(
        (status = 200, description = "Upload directory diagnostics", body = crate::ApiResponse<UploadsHealth>)
    ),
    tag = "Uploads"
)]
pub async fn uploads_health(State(state): State<AppState>) -> ApiResult<UploadsHealth> {
    let dir = PathBuf::from(&state.config.upload_dir);
    let exists = tokio::fs::metadata(&dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let writable = if exists {
        let probe = dir.join(format!(".probe-{}", Uuid::new_v4()));
        match tokio::fs::write(&probe, b"ok").await {
            Ok(_) => {
                let _ = tokio::fs::remove_file(&probe).await;
                true
            }
            Err(_) => false,
        }
    } else {
        false
    };

    Ok(Json(ApiResponse::success(UploadsHealth {
        upload_dir: state.config.upload_dir.clone(),
        exists,
        writable,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_lose_path_components_and_odd_characters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("slip (1).jpg"), "slip1.jpg");
        assert_eq!(sanitize_filename("C:\\Users\\me\\slip.png"), "slip.png");
        assert_eq!(sanitize_filename("..."), "");
    }
}
