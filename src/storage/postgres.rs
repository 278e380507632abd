//! Postgres link storage.
//!
//! Expects the `links` table owned by the main application:
//!
//! ```text
//! links
//! ├── id                               bigint primary key
//! ├── url, domain                      text
//! ├── host_profile_id                  bigint null -> host_profiles.id
//! ├── created_at, removed_at           timestamptz
//! ├── preview_json                     jsonb null
//! ├── preview_status                   text null ('ok' | 'blocked' | 'failed')
//! ├── preview_fetched_at               timestamptz null
//! ├── preview_expires_at               timestamptz null
//! ├── preview_processing_lock_token    text null
//! └── preview_processing_locked_until  timestamptz null
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::Result;
use crate::models::{DatabaseConfig, LinkRecord, PreviewCache, PreviewStatus};
use crate::storage::{LeaseStore, LinkStore};

/// Link storage backed by Postgres.
#[derive(Clone)]
pub struct PostgresLinkRepository {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: i64,
    url: String,
    domain: String,
    host_profile_id: Option<i64>,
    created_at: DateTime<Utc>,
    removed_at: Option<DateTime<Utc>>,
    preview_json: Option<serde_json::Value>,
    preview_status: Option<String>,
    preview_fetched_at: Option<DateTime<Utc>>,
    preview_expires_at: Option<DateTime<Utc>>,
    preview_processing_lock_token: Option<String>,
    preview_processing_locked_until: Option<DateTime<Utc>>,
}

impl LinkRow {
    fn into_record(self) -> LinkRecord {
        let preview_status = self.preview_status.as_deref().and_then(|s| {
            s.parse::<PreviewStatus>()
                .map_err(|e| log::warn!("Link {}: {}", self.id, e))
                .ok()
        });

        LinkRecord {
            id: self.id,
            url: self.url,
            domain: self.domain,
            host_profile_id: self.host_profile_id,
            created_at: self.created_at,
            removed_at: self.removed_at,
            preview_payload: self.preview_json,
            preview_status,
            preview_fetched_at: self.preview_fetched_at,
            preview_expires_at: self.preview_expires_at,
            lock_token: self.preview_processing_lock_token,
            locked_until: self.preview_processing_locked_until,
        }
    }
}

impl PostgresLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl LinkStore for PostgresLinkRepository {
    async fn find_link(&self, id: i64) -> Result<Option<LinkRecord>> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, url, domain, host_profile_id, created_at, removed_at,
                   preview_json, preview_status, preview_fetched_at, preview_expires_at,
                   preview_processing_lock_token, preview_processing_locked_until
            FROM links
            WHERE id = $1 AND removed_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(LinkRow::into_record))
    }

    async fn save_preview(&self, id: i64, cache: &PreviewCache) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET preview_json = $1,
                preview_status = $2,
                preview_fetched_at = $3,
                preview_expires_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&cache.payload)
        .bind(cache.status.as_str())
        .bind(cache.fetched_at)
        .bind(cache.expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl LeaseStore for PostgresLinkRepository {
    async fn claim_batch(
        &self,
        limit: i64,
        lock_token: &str,
        lease: Duration,
    ) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            WITH next_links AS (
                SELECT id
                FROM links
                WHERE removed_at IS NULL
                  AND (preview_expires_at IS NULL OR preview_expires_at <= NOW())
                  AND (preview_processing_locked_until IS NULL
                       OR preview_processing_locked_until <= NOW())
                ORDER BY COALESCE(preview_fetched_at, created_at) ASC, id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            ),
            claimed AS (
                UPDATE links
                SET preview_processing_lock_token = $2,
                    preview_processing_locked_until = NOW() + ($3 || ' seconds')::INTERVAL
                WHERE id IN (SELECT id FROM next_links)
                RETURNING id, COALESCE(preview_fetched_at, created_at) AS stale_since
            )
            SELECT id FROM claimed ORDER BY stale_since ASC, id ASC
            "#,
        )
        .bind(limit)
        .bind(lock_token)
        .bind(lease.num_seconds().to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn release_lock(&self, id: i64, lock_token: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE links
            SET preview_processing_lock_token = NULL,
                preview_processing_locked_until = NULL
            WHERE id = $1 AND preview_processing_lock_token = $2
            "#,
        )
        .bind(id)
        .bind(lock_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
