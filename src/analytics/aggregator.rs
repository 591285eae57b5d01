//! On-demand analytics over a QR code's visit history
//!
//! Every summary is recomputed from the full, recency-ordered visit list. The
//! list is unpaginated, so cost grows linearly with a code's visit count.

use chrono::DateTime;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::models::{QrCode, Visit};
use crate::storage::{Storage, StorageResult};

/// How many of the newest visits are returned verbatim
pub const RECENT_VISITS_LIMIT: usize = 10;

/// Bucket label for visits without a device classification
pub const UNKNOWN_DEVICE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_scans: u64,
    /// Distinct non-null IPs
    pub unique_visitors: u64,
    /// Keyed by UTC calendar date (`YYYY-MM-DD`)
    pub visits_by_date: BTreeMap<String, u64>,
    /// Visits without a country are left out
    pub visits_by_country: BTreeMap<String, u64>,
    pub visits_by_device: BTreeMap<String, u64>,
    pub recent_visits: Vec<Visit>,
}

/// Load the visits of an already authorized QR code and summarize them
pub async fn aggregate(storage: &dyn Storage, qr_code: &QrCode) -> StorageResult<AnalyticsSummary> {
    let visits = storage.list_visits(&qr_code.id).await?;
    Ok(summarize(visits))
}

/// Summarize visits ordered newest first
pub fn summarize(visits: Vec<Visit>) -> AnalyticsSummary {
    let mut unique_ips = HashSet::new();
    let mut visits_by_date = BTreeMap::new();
    let mut visits_by_country = BTreeMap::new();
    let mut visits_by_device = BTreeMap::new();

    for visit in &visits {
        if let Some(ref ip) = visit.ip {
            unique_ips.insert(ip.as_str());
        }

        *visits_by_date.entry(date_key(visit.timestamp)).or_insert(0) += 1;

        if let Some(ref country) = visit.country {
            *visits_by_country.entry(country.clone()).or_insert(0) += 1;
        }

        let device = visit.device.as_deref().unwrap_or(UNKNOWN_DEVICE);
        *visits_by_device.entry(device.to_string()).or_insert(0) += 1;
    }

    let total_scans = visits.len() as u64;
    let unique_visitors = unique_ips.len() as u64;
    let recent_visits = visits.into_iter().take(RECENT_VISITS_LIMIT).collect();

    AnalyticsSummary {
        total_scans,
        unique_visitors,
        visits_by_date,
        visits_by_country,
        visits_by_device,
        recent_visits,
    }
}

/// UTC calendar date of a millisecond timestamp
fn date_key(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "invalid-date".to_string())
}
