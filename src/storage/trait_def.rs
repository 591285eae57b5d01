use crate::models::{QrCode, QrCodeChanges, Visit};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("slug already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Other(err.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable state for QR codes and their visits.
///
/// Every index (slug, owner, visits per QR code) is maintained by the backend
/// together with the records it points at: an index entry never outlives its
/// target.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a QR code. Fails with `Conflict` if the slug is taken; the check
    /// and the insert are a single atomic statement.
    async fn create_qr_code(&self, qr_code: &QrCode) -> StorageResult<QrCode>;

    async fn get_qr_code(&self, id: &str) -> StorageResult<Option<QrCode>>;

    /// Look a QR code up through the slug index
    async fn get_qr_code_by_slug(&self, slug: &str) -> StorageResult<Option<QrCode>>;

    /// All QR codes owned by `user_id`, most recently created first
    async fn list_qr_codes_by_user(&self, user_id: &str) -> StorageResult<Vec<QrCode>>;

    /// Apply owner edits. Returns `None` if the QR code does not exist.
    async fn update_qr_code(
        &self,
        id: &str,
        changes: &QrCodeChanges,
    ) -> StorageResult<Option<QrCode>>;

    /// Remove the QR code, its slug and owner index entries and all of its
    /// visits in one transaction. Returns the deleted record, or `None` if it
    /// did not exist.
    async fn delete_qr_code(&self, id: &str) -> StorageResult<Option<QrCode>>;

    /// Persist a visit and its entry in the per-QR-code visit index
    async fn record_visit(&self, visit: &Visit) -> StorageResult<()>;

    async fn get_visit(&self, id: &str) -> StorageResult<Option<Visit>>;

    /// All visits of a QR code, most recent first
    async fn list_visits(&self, qr_code_id: &str) -> StorageResult<Vec<Visit>>;
}
