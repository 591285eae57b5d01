use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub geoip: GeoIpConfig,
    pub cache: CacheConfig,
    pub cors: CorsConfig,
    /// Production mode hides internal error detail from 500 responses
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Development only: the bearer token is taken as the user id
    None,
    Oauth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub issuer_url: String,
    pub audience: String,
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "OAuthConfig::default_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
}

impl OAuthConfig {
    const fn default_cache_ttl_secs() -> u64 {
        300
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    pub enabled: bool,
    /// Lookup URL with an `{ip}` placeholder
    pub api_url: String,
    pub timeout_ms: u64,
    /// Optional MaxMind City database used instead of the HTTP API
    pub city_db_path: Option<String>,
}

impl GeoIpConfig {
    pub const DEFAULT_API_URL: &'static str = "https://ipapi.co/{ip}/json/";
    pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub slug_cache_max_entries: u64,
    /// 0 disables the slug cache
    pub slug_cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

/// `none` trusts the bearer token as the user id, so it is only accepted
/// outside production. Unset means `none`.
fn parse_auth_mode(value: Option<&str>, production: bool) -> anyhow::Result<AuthMode> {
    let mode = match value.map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("none") => AuthMode::None,
        Some("oauth") => AuthMode::Oauth,
        Some(other) => anyhow::bail!(
            "Unknown AUTH_MODE '{other}'. Supported values: none, oauth"
        ),
    };

    if production && matches!(mode, AuthMode::None) {
        anyhow::bail!("AUTH_MODE=none is not allowed when APP_ENV=production; set AUTH_MODE=oauth");
    }

    Ok(mode)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./qrtrack.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let auth_mode = parse_auth_mode(std::env::var("AUTH_MODE").ok().as_deref(), production)?;

        let oauth = if matches!(auth_mode, AuthMode::Oauth) {
            let issuer_url = std::env::var("OAUTH_ISSUER_URL")
                .context("OAUTH_ISSUER_URL must be set when AUTH_MODE=oauth")?;
            let audience = std::env::var("OAUTH_AUDIENCE")
                .context("OAUTH_AUDIENCE must be set when AUTH_MODE=oauth")?;
            let jwks_url = std::env::var("OAUTH_JWKS_URL").ok();
            let jwks_cache_ttl_secs = std::env::var("OAUTH_JWKS_CACHE_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or_else(OAuthConfig::default_cache_ttl_secs);

            Some(OAuthConfig {
                issuer_url,
                audience,
                jwks_url,
                jwks_cache_ttl_secs,
            })
        } else {
            None
        };

        let geoip = GeoIpConfig {
            enabled: env_flag("GEOIP_ENABLED", true),
            api_url: std::env::var("GEOIP_API_URL")
                .unwrap_or_else(|_| GeoIpConfig::DEFAULT_API_URL.to_string()),
            timeout_ms: std::env::var("GEOIP_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(GeoIpConfig::DEFAULT_TIMEOUT_MS),
            city_db_path: std::env::var("GEOIP_CITY_DB_PATH").ok(),
        };

        let cache = CacheConfig {
            slug_cache_max_entries: std::env::var("SLUG_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10_000),
            slug_cache_ttl_secs: std::env::var("SLUG_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };

        let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| parse_origins(&v))
            .unwrap_or_else(|_| vec!["http://localhost:5173".to_string()]);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            auth: AuthConfig {
                mode: auth_mode,
                oauth,
            },
            geoip,
            cache,
            cors: CorsConfig { allowed_origins },
            production,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("http://a.test, https://b.test ,,"),
            vec!["http://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn auth_mode_defaults_to_none_outside_production() {
        assert!(matches!(parse_auth_mode(None, false).unwrap(), AuthMode::None));
        assert!(matches!(parse_auth_mode(Some("None"), false).unwrap(), AuthMode::None));
        assert!(matches!(parse_auth_mode(Some("oauth"), false).unwrap(), AuthMode::Oauth));
        assert!(matches!(parse_auth_mode(Some("oauth"), true).unwrap(), AuthMode::Oauth));
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let err = parse_auth_mode(Some("oath"), false).unwrap_err();
        assert!(err.to_string().contains("Unknown AUTH_MODE 'oath'"));
        assert!(parse_auth_mode(Some("oath"), true).is_err());
        assert!(parse_auth_mode(Some(""), false).is_err());
    }

    #[test]
    fn production_refuses_development_auth() {
        assert!(parse_auth_mode(None, true).is_err());
        assert!(parse_auth_mode(Some("none"), true).is_err());
    }

    #[test]
    fn geoip_timeout_is_milliseconds() {
        let config = GeoIpConfig {
            enabled: true,
            api_url: GeoIpConfig::DEFAULT_API_URL.to_string(),
            timeout_ms: 1500,
            city_db_path: None,
        };
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert!(config.api_url.contains("{ip}"));
    }
}
