use crate::error::AppError;
use crate::models::QrCode;
use crate::storage::Storage;

/// Resolve a public slug to its QR code through the slug index.
///
/// A missing index entry and a missing record both read as `NotFound`.
pub async fn resolve_slug(storage: &dyn Storage, slug: &str) -> Result<QrCode, AppError> {
    storage
        .get_qr_code_by_slug(slug)
        .await?
        .ok_or(AppError::NotFound("QR code"))
}
