pub mod oauth;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AuthConfig, AuthMode};
use crate::error::AppError;
use oauth::OAuthValidator;

/// Identity of an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

pub struct AuthService {
    mode: AuthMode,
    oauth: Option<OAuthValidator>,
}

impl AuthService {
    pub async fn new(config: AuthConfig) -> anyhow::Result<Self> {
        let oauth = match config.mode {
            AuthMode::Oauth => {
                let oauth_config = config
                    .oauth
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("OAuth configuration missing"))?;
                Some(OAuthValidator::from_config(oauth_config).await?)
            }
            AuthMode::None => None,
        };

        Ok(Self {
            mode: config.mode,
            oauth,
        })
    }

    /// Resolve a bearer token to the caller identity
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AppError> {
        match (&self.mode, &self.oauth) {
            (AuthMode::Oauth, Some(validator)) => {
                validator.authenticate(token).await.map_err(|e| {
                    warn!("Authentication error: {:#}", e);
                    AppError::Unauthorized("Invalid token")
                })
            }
            (AuthMode::Oauth, None) => Err(AppError::Unauthorized("Invalid token")),
            (AuthMode::None, _) => Ok(AuthUser {
                uid: token.to_string(),
                email: None,
            }),
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reject requests without a valid bearer credential; otherwise make the
/// caller's `AuthUser` available to handlers as a request extension.
pub async fn require_auth(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request).map(str::to_string) else {
        return AppError::Unauthorized("No token provided").into_response();
    };

    match auth_service.authenticate(&token).await {
        Ok(user) => {
            debug!(uid = %user.uid, "authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}
