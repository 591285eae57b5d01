//! Data models for analytics

use serde::{Deserialize, Serialize};

/// Geographic location derived from a visitor IP.
///
/// The default value (every field `None`) is the outcome of a failed or
/// skipped lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoLocation {
    /// City name
    pub city: Option<String>,

    /// Country name
    pub country: Option<String>,

    /// ISO country code (e.g., "US", "GB")
    pub country_code: Option<String>,
}

impl GeoLocation {
    pub fn is_unknown(&self) -> bool {
        self.city.is_none() && self.country.is_none() && self.country_code.is_none()
    }
}
