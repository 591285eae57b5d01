use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use crate::auth::{require_auth, AuthService};
use crate::storage::Storage;

use super::analytics::get_qr_code_analytics;
use super::handlers::{
    create_qr_code, delete_qr_code, get_qr_code, list_qr_codes, update_qr_code, AppState,
};

/// Authenticated QR code management routes under `/api`
pub fn create_api_router(storage: Arc<dyn Storage>, auth_service: Arc<AuthService>) -> Router {
    let state = Arc::new(AppState { storage });

    Router::new()
        .route("/api/qr-codes", post(create_qr_code).get(list_qr_codes))
        .route("/api/qr-codes/{id}", get(get_qr_code))
        .route("/api/qr-codes/{id}/analytics", get(get_qr_code_analytics))
        .route("/api/qr-codes/{id}/update", put(update_qr_code))
        .route("/api/qr-codes/{id}/delete", delete(delete_qr_code))
        .route_layer(middleware::from_fn_with_state(auth_service, require_auth))
        .with_state(state)
}
