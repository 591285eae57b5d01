use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers::{health_check, redirect_slug};
use super::orchestrator::RedirectOrchestrator;

/// Public routes: `/r/{slug}` and `/health`
pub fn create_redirect_router(orchestrator: Arc<RedirectOrchestrator>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/r/{slug}", get(redirect_slug))
        .with_state(orchestrator)
}
