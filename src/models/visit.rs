use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::analytics::{Device, GeoLocation};

/// One recorded redirect event. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: String,
    pub qr_code_id: String,
    pub ip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub device: Option<String>,
    /// Visit time in Unix milliseconds
    #[sqlx(rename = "visited_at")]
    pub timestamp: i64,
}

impl Visit {
    pub fn new(qr_code_id: &str, ip: &str, device: Device, geo: GeoLocation) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            qr_code_id: qr_code_id.to_string(),
            ip: Some(ip.to_string()),
            city: geo.city,
            country: geo.country,
            country_code: geo.country_code,
            device: Some(device.as_str().to_string()),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
