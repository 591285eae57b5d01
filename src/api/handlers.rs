use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{CreateQrCodeRequest, QrCode, UpdateQrCodeRequest};
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

/// Fetch a QR code and check that `user` owns it
pub(crate) async fn load_owned_qr_code(
    storage: &dyn Storage,
    id: &str,
    user: &AuthUser,
) -> Result<QrCode, AppError> {
    let qr_code = storage
        .get_qr_code(id)
        .await?
        .ok_or(AppError::NotFound("QR code"))?;

    if !qr_code.is_owned_by(&user.uid) {
        return Err(AppError::Forbidden);
    }

    Ok(qr_code)
}

/// Create a QR code owned by the caller
pub async fn create_qr_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateQrCodeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QrCode>), AppError> {
    let Json(payload) = payload?;
    let valid = payload.validate()?;

    let qr_code = state
        .storage
        .create_qr_code(&QrCode::new(&user.uid, valid))
        .await?;

    info!(id = %qr_code.id, slug = %qr_code.slug, uid = %user.uid, "created QR code");
    Ok((StatusCode::CREATED, Json(qr_code)))
}

/// List the caller's QR codes, newest first
pub async fn list_qr_codes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<QrCode>>, AppError> {
    let qr_codes = state.storage.list_qr_codes_by_user(&user.uid).await?;
    Ok(Json(qr_codes))
}

/// Get one of the caller's QR codes
pub async fn get_qr_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<QrCode>, AppError> {
    let qr_code = load_owned_qr_code(state.storage.as_ref(), &id, &user).await?;
    Ok(Json(qr_code))
}

/// Update title, target URL and color of one of the caller's QR codes
pub async fn update_qr_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateQrCodeRequest>, JsonRejection>,
) -> Result<Json<QrCode>, AppError> {
    let Json(payload) = payload?;
    let changes = payload.validate()?;

    load_owned_qr_code(state.storage.as_ref(), &id, &user).await?;

    let updated = state
        .storage
        .update_qr_code(&id, &changes)
        .await?
        .ok_or(AppError::NotFound("QR code"))?;

    info!(id = %id, uid = %user.uid, "updated QR code");
    Ok(Json(updated))
}

/// Delete one of the caller's QR codes together with its visits
pub async fn delete_qr_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    load_owned_qr_code(state.storage.as_ref(), &id, &user).await?;

    state
        .storage
        .delete_qr_code(&id)
        .await?
        .ok_or(AppError::NotFound("QR code"))?;

    info!(id = %id, uid = %user.uid, "deleted QR code");
    Ok(Json(SuccessResponse {
        message: "QR code deleted".to_string(),
    }))
}
