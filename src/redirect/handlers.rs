use axum::{
    extract::{Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::orchestrator::RedirectOrchestrator;
use crate::analytics::RequestContext;
use crate::error::AppError;

/// Redirect to the QR code's target URL (302 Found)
pub async fn redirect_slug(
    State(orchestrator): State<Arc<RedirectOrchestrator>>,
    Path(slug): Path<String>,
    context: RequestContext,
) -> Response {
    match orchestrator.handle_redirect(&slug, &context).await {
        Ok(target) => (StatusCode::FOUND, [(LOCATION, target.url)]).into_response(),
        Err(AppError::NotFound(_)) => (StatusCode::NOT_FOUND, "QR code not found").into_response(),
        Err(e) => {
            tracing::error!(slug = %slug, error = %e, "redirect failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing redirect").into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
