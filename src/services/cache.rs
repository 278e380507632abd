//! Cache writer.
//!
//! Persists an outcome with a status-dependent expiry. Write failures are
//! logged and swallowed so they never change what the caller sees.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{CacheConfig, FetchOutcome, MAX_TTL_SECS, PreviewCache, PreviewStatus};
use crate::storage::LinkStore;

/// Writes fetch outcomes onto link records.
pub struct CacheWriter {
    store: Arc<dyn LinkStore>,
    ok_ttl: Duration,
    failure_ttl: Duration,
}

impl CacheWriter {
    pub fn new(store: Arc<dyn LinkStore>, config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            store,
            ok_ttl: ttl_from_secs("cache.ok_ttl_secs", config.ok_ttl_secs)?,
            failure_ttl: ttl_from_secs("cache.failure_ttl_secs", config.failure_ttl_secs)?,
        })
    }

    /// Time-to-live for an outcome of the given status.
    pub fn ttl(&self, status: PreviewStatus) -> Duration {
        match status {
            PreviewStatus::Ok => self.ok_ttl,
            PreviewStatus::Blocked | PreviewStatus::Failed => self.failure_ttl,
        }
    }

    /// Persist `outcome` for `link_id`.
    pub async fn save(&self, link_id: i64, outcome: &FetchOutcome) {
        if let Err(e) = self.try_save(link_id, outcome).await {
            log::error!("Failed to cache preview for link {}: {}", link_id, e);
        }
    }

    async fn try_save(&self, link_id: i64, outcome: &FetchOutcome) -> Result<()> {
        let fetched_at = Utc::now();
        let cache = PreviewCache {
            payload: serde_json::to_value(outcome)?,
            status: outcome.status,
            fetched_at,
            expires_at: fetched_at
                .checked_add_signed(self.ttl(outcome.status))
                .ok_or_else(|| AppError::validation("preview expiry overflows"))?,
        };
        self.store.save_preview(link_id, &cache).await
    }
}

fn ttl_from_secs(name: &str, secs: i64) -> Result<Duration> {
    if !(1..=MAX_TTL_SECS).contains(&secs) {
        return Err(AppError::validation(format!(
            "{name} must be between 1 and {MAX_TTL_SECS}"
        )));
    }
    Duration::try_seconds(secs)
        .ok_or_else(|| AppError::validation(format!("{name} of {secs}s overflows")))
}
