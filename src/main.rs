use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use qrtrack::analytics::{build_geo_lookup, VisitRecorder};
use qrtrack::api::create_api_router;
use qrtrack::auth::AuthService;
use qrtrack::config::{AuthMode, Config};
use qrtrack::error::expose_error_detail;
use qrtrack::redirect::{create_redirect_router, RedirectOrchestrator};
use qrtrack::storage::{connect, CachedStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Initializing database...");
    let backend = connect(&config.database).await?;
    info!("Database initialized successfully");

    let storage: Arc<dyn Storage> = if config.cache.slug_cache_ttl_secs > 0 {
        info!(
            "Slug cache enabled (max {} entries, ttl {}s)",
            config.cache.slug_cache_max_entries, config.cache.slug_cache_ttl_secs
        );
        Arc::new(CachedStorage::new(
            backend,
            config.cache.slug_cache_max_entries,
            config.cache.slug_cache_ttl_secs,
        ))
    } else {
        backend
    };

    // Initialize auth service
    let auth_service = Arc::new(AuthService::new(config.auth.clone()).await?);
    match config.auth.mode {
        AuthMode::None => {
            warn!("🔓 AUTH_MODE=none: bearer tokens are trusted as user ids (development only)");
        }
        AuthMode::Oauth => {
            if let Some(oauth) = config.auth.oauth.as_ref() {
                info!(
                    "🔐 OAuth authentication enabled (issuer: {}, audience: {})",
                    oauth.issuer_url, oauth.audience
                );
            }
        }
    }

    // Visit logging
    let geo_lookup = build_geo_lookup(&config.geoip)?;
    let recorder = VisitRecorder::new(Arc::clone(&storage), geo_lookup);
    let orchestrator = Arc::new(RedirectOrchestrator::new(Arc::clone(&storage), recorder));

    let app = create_api_router(Arc::clone(&storage), auth_service)
        .merge(create_redirect_router(orchestrator))
        .layer(middleware::from_fn_with_state(
            !config.production,
            expose_error_detail,
        ))
        .layer(cors_layer(&config.cors.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Server listening on http://{}", addr);
    info!("   - API endpoints available at http://{}/api/qr-codes", addr);
    info!("   - Redirects served at http://{}/r/{{slug}}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
