use crate::models::{QrCode, QrCodeChanges, Visit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
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
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
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
                visited_at BIGINT NOT NULL
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (slug) DO NOTHING
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
            WHERE id = $1
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
            WHERE slug = $1
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
            WHERE user_id = $1
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
            SET title = $1, target_url = $2, color = COALESCE($3, color), updated_at = $4
            WHERE id = $5
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

        // Row lock keeps concurrent visit inserts out until the delete commits
        let qr_code = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT id, user_id, title, target_url, slug, color, created_at, updated_at
            FROM qr_codes
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(qr_code) = qr_code else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM visits WHERE qr_code_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM qr_codes WHERE id = $1")
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
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
            WHERE id = $1
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
            WHERE qr_code_id = $1
            ORDER BY visited_at DESC, id DESC
            "#,
        )
        .bind(qr_code_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(visits)
    }
}
