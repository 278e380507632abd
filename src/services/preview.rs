// src/services/preview.rs

//! Preview service.
//!
//! Composition root for one link at a time: read cache, validate, fetch,
//! write cache. Expected failures (validation, transport, parsing) always
//! come back as an outcome; only storage errors on load are returned as `Err`.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{FetchOutcome, LinkRecord};
use crate::services::cache::CacheWriter;
use crate::services::fetcher::PreviewFetcher;
use crate::storage::LinkStore;
use crate::utils::url::normalize_url_for_fetch;

/// Serves link previews, from cache when possible.
pub struct PreviewService {
    store: Arc<dyn LinkStore>,
    fetcher: PreviewFetcher,
    cache: CacheWriter,
}

impl PreviewService {
    pub fn new(store: Arc<dyn LinkStore>, fetcher: PreviewFetcher, cache: CacheWriter) -> Self {
        Self {
            store,
            fetcher,
            cache,
        }
    }

    /// Return the cached preview if still fresh, otherwise fetch it.
    pub async fn get_or_fetch(&self, link_id: i64) -> Result<FetchOutcome> {
        self.process(link_id, true).await
    }

    /// Fetch the preview regardless of cache state.
    pub async fn force_refetch(&self, link_id: i64) -> Result<FetchOutcome> {
        self.process(link_id, false).await
    }

    async fn process(&self, link_id: i64, use_cache: bool) -> Result<FetchOutcome> {
        let Some(link) = self.store.find_link(link_id).await? else {
            log::info!("Link {} not found", link_id);
            return Ok(FetchOutcome::link_not_found());
        };

        let url = normalize_url_for_fetch(&link.url);
        if let Err(e) = self.fetcher.validator().validate(&url).await {
            log::info!("Link {} rejected ({}): {}", link_id, url, e);
            let outcome = FetchOutcome::failed(url, e.to_string());
            self.cache.save(link_id, &outcome).await;
            return Ok(outcome);
        }

        if use_cache {
            if let Some(cached) = cached_outcome(&link) {
                log::debug!("Link {} served from cache", link_id);
                return Ok(cached);
            }
        }

        let outcome = self.fetcher.fetch_validated(&url).await;
        log::info!("Link {} fetched: {}", link_id, outcome.status);
        self.cache.save(link_id, &outcome).await;
        Ok(outcome)
    }
}

/// Deserialize a fresh cached payload; unreadable payloads count as a miss.
fn cached_outcome(link: &LinkRecord) -> Option<FetchOutcome> {
    if !link.has_fresh_preview(Utc::now()) {
        return None;
    }
    let payload = link.preview_payload.clone()?;
    serde_json::from_value(payload)
        .map_err(|e| log::warn!("Ignoring unreadable cached preview for link {}: {}", link.id, e))
        .ok()
}
