use std::sync::Arc;
use tracing::{debug, error};

use super::resolver::resolve_slug;
use crate::analytics::{RequestContext, VisitRecorder};
use crate::error::AppError;
use crate::storage::Storage;

/// Where a resolved slug sends the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub url: String,
}

/// Composes slug resolution and visit logging into the public redirect flow
pub struct RedirectOrchestrator {
    storage: Arc<dyn Storage>,
    recorder: VisitRecorder,
}

impl RedirectOrchestrator {
    pub fn new(storage: Arc<dyn Storage>, recorder: VisitRecorder) -> Self {
        Self { storage, recorder }
    }

    /// Resolve `slug`, log the visit, and return the redirect target.
    ///
    /// The visit is attempted before the target is returned. A failed
    /// recording is logged and never changes the outcome; an unknown slug
    /// records nothing.
    pub async fn handle_redirect(
        &self,
        slug: &str,
        context: &RequestContext,
    ) -> Result<RedirectTarget, AppError> {
        let qr_code = resolve_slug(self.storage.as_ref(), slug).await?;

        match self.recorder.record(&qr_code.id, context).await {
            Ok(visit) => {
                debug!(slug = %slug, visit_id = %visit.id, device = %context.device, "visit recorded");
            }
            Err(e) => {
                error!(slug = %slug, error = %e, "failed to record visit");
            }
        }

        Ok(RedirectTarget {
            url: qr_code.target_url,
        })
    }
}
