use crate::models::{QrCode, QrCodeChanges, Visit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens a fresh database, so in-memory
        // pools are pinned to a single connection that is never recycled.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_with(options)
                .await?
        };

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qr_codes (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                target_url TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                color TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_qr_codes_user ON qr_codes(user_id, created_at DESC)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id TEXT PRIMARY KEY,
                qr_code_id TEXT NOT NULL REFERENCES qr_codes(id) ON DELETE CASCADE,
                ip TEXT,
                city TEXT,
                country TEXT,
                country_code TEXT,
                device TEXT,
                visited_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_visits_qr_code ON visits(qr_code_id, visited_at DESC)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_qr_code(&self, qr_code: &QrCode) -> StorageResult<QrCode> {
        let result = sqlx::query(
            r#"
            INSERT INTO qr_codes (id, user_id, title, target_url, slug, color, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO NOTHING
            "#,
        )
        .bind(&qr_code.id)
        .bind(&qr_code.user_id)
        .bind(&qr_code.title)
        .bind(&qr_code.target_url)
        .bind(&qr_code.slug)
        .bind(&qr_code.color)
        .bind(qr_code.created_at)
        .bind(qr_code.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Ok(qr_code.clone())
    }

    async fn get_qr_code(&self, id: &str) -> StorageResult<Option<QrCode>> {
        let qr_code = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, user_id, title, target_url, slug, color, created_at, updated_at
            FROM qr_codes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(qr_code)
    }

    async fn get_qr_code_by_slug(&self, slug: &str) -> StorageResult<Option<QrCode>> {
        let qr_code = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, user_id, title, target_url, slug, color, created_at, updated_at
            FROM qr_codes
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(qr_code)
    }

    async fn list_qr_codes_by_user(&self, user_id: &str) -> StorageResult<Vec<QrCode>> {
        let qr_codes = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, user_id, title, target_url, slug, color, created_at, updated_at
            FROM qr_codes
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(qr_codes)
    }

    async fn update_qr_code(
        &self,
        id: &str,
        changes: &QrCodeChanges,
    ) -> StorageResult<Option<QrCode>> {
        let qr_code = sqlx::query_as::<_, QrCode>(
            r#"
            UPDATE qr_codes
            SET title = ?, target_url = ?, color = COALESCE(?, color), updated_at = ?
            WHERE id = ?
            RETURNING id, user_id, title, target_url, slug, color, created_at, updated_at
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.target_url)
        .bind(changes.color.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(qr_code)
    }

    async fn delete_qr_code(&self, id: &str) -> StorageResult<Option<QrCode>> {
        let mut tx = self.pool.begin().await?;

        let qr_code = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, user_id, title, target_url, slug, color, created_at, updated_at
            FROM qr_codes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(qr_code) = qr_code else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM visits WHERE qr_code_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM qr_codes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(qr_code))
    }

    async fn record_visit(&self, visit: &Visit) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO visits (id, qr_code_id, ip, city, country, country_code, device, visited_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&visit.id)
        .bind(&visit.qr_code_id)
        .bind(visit.ip.as_deref())
        .bind(visit.city.as_deref())
        .bind(visit.country.as_deref())
        .bind(visit.country_code.as_deref())
        .bind(visit.device.as_deref())
        .bind(visit.timestamp)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_visit(&self, id: &str) -> StorageResult<Option<Visit>> {
        let visit = sqlx::query_as::<_, Visit>(
            r#"
            SELECT id, qr_code_id, ip, city, country, country_code, device, visited_at
            FROM visits
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(visit)
    }

    async fn list_visits(&self, qr_code_id: &str) -> StorageResult<Vec<Visit>> {
        let visits = sqlx::query_as::<_, Visit>(
            r#"
            SELECT id, qr_code_id, ip, city, country, country_code, device, visited_at
            FROM visits
            WHERE qr_code_id = ?
            ORDER BY visited_at DESC, id DESC
            "#,
        )
        .bind(qr_code_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(visits)
    }
}
