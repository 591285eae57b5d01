use crate::models::{QrCode, QrCodeChanges, Visit};
use crate::storage::{Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Storage wrapper that caches slug resolution.
///
/// Only hits are cached, so a slug created after a miss is visible at once.
/// Entries are dropped when the QR code they point at is updated or deleted.
pub struct CachedStorage {
    /// Underlying storage implementation
    inner: Arc<dyn Storage>,
    /// Slug -> QR code cache (Moka cache)
    slug_cache: Cache<String, QrCode>,
}

impl CachedStorage {
    pub fn new(inner: Arc<dyn Storage>, max_entries: u64, ttl_secs: u64) -> Self {
        let slug_cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, slug_cache }
    }

    /// Invalidate cache entry for a specific slug
    async fn invalidate_cache(&self, slug: &str) {
        self.slug_cache.invalidate(slug).await;
    }
}

#[async_trait]
impl Storage for CachedStorage {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn create_qr_code(&self, qr_code: &QrCode) -> StorageResult<QrCode> {
        self.inner.create_qr_code(qr_code).await
    }

    async fn get_qr_code(&self, id: &str) -> StorageResult<Option<QrCode>> {
        self.inner.get_qr_code(id).await
    }

    async fn get_qr_code_by_slug(&self, slug: &str) -> StorageResult<Option<QrCode>> {
        if let Some(cached) = self.slug_cache.get(slug).await {
            return Ok(Some(cached));
        }

        let result = self.inner.get_qr_code_by_slug(slug).await?;

        if let Some(ref qr_code) = result {
            self.slug_cache
                .insert(slug.to_string(), qr_code.clone())
                .await;
        }

        Ok(result)
    }

    async fn list_qr_codes_by_user(&self, user_id: &str) -> StorageResult<Vec<QrCode>> {
        self.inner.list_qr_codes_by_user(user_id).await
    }

    async fn update_qr_code(
        &self,
        id: &str,
        changes: &QrCodeChanges,
    ) -> StorageResult<Option<QrCode>> {
        let result = self.inner.update_qr_code(id, changes).await?;

        if let Some(ref qr_code) = result {
            self.invalidate_cache(&qr_code.slug).await;
        }

        Ok(result)
    }

    async fn delete_qr_code(&self, id: &str) -> StorageResult<Option<QrCode>> {
        let result = self.inner.delete_qr_code(id).await?;

        if let Some(ref qr_code) = result {
            self.invalidate_cache(&qr_code.slug).await;
        }

        Ok(result)
    }

    async fn record_visit(&self, visit: &Visit) -> StorageResult<()> {
        self.inner.record_visit(visit).await
    }

    async fn get_visit(&self, id: &str) -> StorageResult<Option<Visit>> {
        self.inner.get_visit(id).await
    }

    async fn list_visits(&self, qr_code_id: &str) -> StorageResult<Vec<Visit>> {
        self.inner.list_visits(qr_code_id).await
    }
}
