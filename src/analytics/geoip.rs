//! Best-effort IP geolocation
//!
//! Lookups never fail from the caller's point of view: network errors, error
//! statuses, unparseable bodies and unknown addresses all yield
//! `GeoLocation::default()`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use moka::future::Cache;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analytics::models::GeoLocation;
use crate::config::GeoIpConfig;

/// Successful lookups are reused for this long
const GEO_CACHE_TTL_SECS: u64 = 15 * 60;
const GEO_CACHE_MAX_ENTRIES: u64 = 10_000;

#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Resolve `ip` to a location, or the unknown location on any failure
    async fn lookup(&self, ip: &str) -> GeoLocation;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Pick the geolocation provider described by the configuration.
///
/// A configured MaxMind database wins when it opens; otherwise the external
/// HTTP API is used.
pub fn build_geo_lookup(config: &GeoIpConfig) -> Result<Arc<dyn GeoLookup>> {
    let lookup: Arc<dyn GeoLookup> = if !config.enabled {
        Arc::new(DisabledGeoLocator)
    } else if let Some(ref path) = config.city_db_path {
        match MaxMindGeoLocator::new(path) {
            Ok(locator) => Arc::new(locator),
            Err(e) => {
                warn!(
                    "GeoIP: failed to open MaxMind database at {}: {:#}, falling back to HTTP API",
                    path, e
                );
                Arc::new(HttpGeoLocator::new(&config.api_url, config.timeout())?)
            }
        }
    } else {
        Arc::new(HttpGeoLocator::new(&config.api_url, config.timeout())?)
    };

    info!("GeoIP: using {} provider", lookup.name());
    Ok(lookup)
}

/// External HTTP geolocation API (ipapi.co compatible)
pub struct HttpGeoLocator {
    client: Client,
    /// URL with an `{ip}` placeholder
    url_template: String,
    cache: Cache<String, GeoLocation>,
}

impl HttpGeoLocator {
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("qrtrack-geoip/0.1.0")
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for geolocation")?;

        let cache = Cache::builder()
            .max_capacity(GEO_CACHE_MAX_ENTRIES)
            .time_to_live(Duration::from_secs(GEO_CACHE_TTL_SECS))
            .build();

        Ok(Self {
            client,
            url_template: url_template.to_string(),
            cache,
        })
    }

    async fn fetch(&self, ip: &str) -> Option<GeoLocation> {
        let url = self.url_template.replace("{ip}", ip);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(ip = %ip, error = %e, "geolocation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(ip = %ip, status = %response.status(), "geolocation API returned an error status");
            return None;
        }

        match response.json::<Value>().await {
            Ok(body) => parse_geo_response(&body),
            Err(e) => {
                warn!(ip = %ip, error = %e, "failed to decode geolocation response");
                None
            }
        }
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLocator {
    async fn lookup(&self, ip: &str) -> GeoLocation {
        if ip.parse::<IpAddr>().is_err() {
            debug!(ip = %ip, "skipping geolocation for non-IP address");
            return GeoLocation::default();
        }

        if let Some(cached) = self.cache.get(ip).await {
            return cached;
        }

        match self.fetch(ip).await {
            Some(geo) => {
                self.cache.insert(ip.to_string(), geo.clone()).await;
                geo
            }
            None => GeoLocation::default(),
        }
    }

    fn name(&self) -> &'static str {
        "HTTP API"
    }
}

/// Read a geolocation API body.
///
/// Understands ipapi.co (`country_name`, `country_code`) and ip-api.com
/// (`country`, `countryCode`) field names. Bodies flagged as errors, or
/// carrying no location at all, yield `None`.
pub fn parse_geo_response(body: &Value) -> Option<GeoLocation> {
    if body["error"].as_bool() == Some(true) || body["status"].as_str() == Some("fail") {
        debug!(reason = ?body["reason"].as_str(), "geolocation API reported an error");
        return None;
    }

    let text = |key: &str| {
        body[key]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let geo = GeoLocation {
        city: text("city"),
        country: text("country_name").or_else(|| text("country")),
        country_code: text("country_code").or_else(|| text("countryCode")),
    };

    if geo.is_unknown() {
        None
    } else {
        Some(geo)
    }
}

/// Offline lookups against a MaxMind GeoLite2/GeoIP2 City database
pub struct MaxMindGeoLocator {
    reader: Arc<Reader<Mmap>>,
}

impl MaxMindGeoLocator {
    pub fn new(path: &str) -> Result<Self> {
        let reader = unsafe { Reader::open_mmap(path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", path))?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }
}

#[async_trait]
impl GeoLookup for MaxMindGeoLocator {
    async fn lookup(&self, ip: &str) -> GeoLocation {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return GeoLocation::default();
        };

        let mut geo = GeoLocation::default();
        if let Ok(result) = self.reader.lookup(addr) {
            if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                geo.city = city.city.names.english.map(|s| s.to_string());
                geo.country = city.country.names.english.map(|s| s.to_string());
                geo.country_code = city.country.iso_code.map(|s| s.to_string());
            }
        }

        if geo.is_unknown() {
            debug!(ip = %ip, "no MaxMind record for address");
        }
        geo
    }

    fn name(&self) -> &'static str {
        "MaxMind"
    }
}

/// Used when geolocation is switched off
pub struct DisabledGeoLocator;

#[async_trait]
impl GeoLookup for DisabledGeoLocator {
    async fn lookup(&self, _ip: &str) -> GeoLocation {
        GeoLocation::default()
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
