use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("Forbidden: You don't own this QR code")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => AppError::Conflict("Slug already exists".to_string()),
            StorageError::Other(e) => AppError::Storage(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Internal error text carried on a 500 response for `expose_error_detail`
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Storage(err) => {
                let detail = format!("{err:#}");
                tracing::error!(error = %detail, "request failed with storage error");
                let mut response = (
                    status,
                    Json(ErrorResponse {
                        error: INTERNAL_ERROR_MESSAGE.to_string(),
                        detail: None,
                    }),
                )
                    .into_response();
                response.extensions_mut().insert(ErrorDetail(detail));
                response
            }
            other => (
                status,
                Json(ErrorResponse {
                    error: other.to_string(),
                    detail: None,
                }),
            )
                .into_response(),
        }
    }
}

/// Response middleware that copies `ErrorDetail` into the body of 500
/// responses when `expose` is set. Without it the detail stays hidden.
pub async fn expose_error_detail(
    State(expose): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };
    if !expose {
        return response;
    }

    (
        response.status(),
        Json(ErrorResponse {
            error: INTERNAL_ERROR_MESSAGE.to_string(),
            detail: Some(detail),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn failing_handler() -> Result<(), AppError> {
        Err(AppError::Storage(anyhow::anyhow!("disk full")))
    }

    async fn error_body(app: Router) -> serde_json::Value {
        let response = app
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn storage_detail_hidden_without_layer() {
        let body = error_body(Router::new().route("/", get(failing_handler))).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn storage_detail_follows_layer_setting() {
        let exposed = Router::new()
            .route("/", get(failing_handler))
            .layer(middleware::from_fn_with_state(true, expose_error_detail));
        let body = error_body(exposed).await;
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["detail"], "disk full");

        let hidden = Router::new()
            .route("/", get(failing_handler))
            .layer(middleware::from_fn_with_state(false, expose_error_detail));
        let body = error_body(hidden).await;
        assert!(body.get("detail").is_none());
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("No token provided").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("QR code").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Storage(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_conflict_maps_to_conflict() {
        let err: AppError = StorageError::Conflict.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Slug already exists");
    }

    #[test]
    fn messages_match_public_wording() {
        assert_eq!(AppError::NotFound("QR code").to_string(), "QR code not found");
        assert_eq!(
            AppError::Unauthorized("Invalid token").to_string(),
            "Unauthorized: Invalid token"
        );
    }
}
