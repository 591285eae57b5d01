//! Analytics API handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::handlers::{load_owned_qr_code, AppState};
use crate::analytics::{aggregate, AnalyticsSummary};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::QrCode;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub qr_code: QrCode,
    #[serde(flatten)]
    pub summary: AnalyticsSummary,
}

/// Get the analytics summary for one of the caller's QR codes
pub async fn get_qr_code_analytics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let qr_code = load_owned_qr_code(state.storage.as_ref(), &id, &user).await?;
    let summary = aggregate(state.storage.as_ref(), &qr_code).await?;

    Ok(Json(AnalyticsResponse { qr_code, summary }))
}
