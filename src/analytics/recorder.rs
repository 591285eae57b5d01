//! Visit recording
//!
//! Each call enriches the request with geolocation, then persists exactly one
//! visit (and its visit-index entry). Enrichment cannot fail; persistence
//! errors are returned to the caller untouched, with no retry.

use std::sync::Arc;
use tracing::debug;

use crate::analytics::context::RequestContext;
use crate::analytics::geoip::GeoLookup;
use crate::models::Visit;
use crate::storage::{Storage, StorageResult};

#[derive(Clone)]
pub struct VisitRecorder {
    storage: Arc<dyn Storage>,
    geo: Arc<dyn GeoLookup>,
}

impl VisitRecorder {
    pub fn new(storage: Arc<dyn Storage>, geo: Arc<dyn GeoLookup>) -> Self {
        Self { storage, geo }
    }

    pub async fn record(&self, qr_code_id: &str, context: &RequestContext) -> StorageResult<Visit> {
        let geo = self.geo.lookup(&context.ip).await;
        if geo.is_unknown() {
            debug!(ip = %context.ip, provider = self.geo.name(), "visit recorded without geolocation");
        }

        let visit = Visit::new(qr_code_id, &context.ip, context.device, geo);
        self.storage.record_visit(&visit).await?;

        Ok(visit)
    }
}
