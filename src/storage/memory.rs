//! In-process link storage.
//!
//! Mirrors the Postgres backend's claim semantics: the whole select-and-stamp
//! runs under one lock, so two concurrent claims can never return the same id.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::models::{LinkRecord, PreviewCache};
use crate::storage::{LeaseStore, LinkStore};
use crate::utils::url::derive_domain;

/// Link storage held in memory.
#[derive(Default)]
pub struct MemoryLinkRepository {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    links: BTreeMap<i64, LinkRecord>,
}

impl MemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link created now and return its id.
    pub fn insert(&self, url: &str) -> i64 {
        self.insert_at(url, Utc::now())
    }

    /// Add a link with an explicit creation time.
    pub fn insert_at(&self, url: &str, created_at: DateTime<Utc>) -> i64 {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.links.insert(
            id,
            LinkRecord {
                id,
                url: url.to_string(),
                domain: derive_domain(url).unwrap_or_default(),
                host_profile_id: None,
                created_at,
                removed_at: None,
                preview_payload: None,
                preview_status: None,
                preview_fetched_at: None,
                preview_expires_at: None,
                lock_token: None,
                locked_until: None,
            },
        );
        id
    }

    /// Snapshot of a record, including removed ones.
    pub fn get(&self, id: i64) -> Option<LinkRecord> {
        self.inner.lock().links.get(&id).cloned()
    }

    /// Soft-remove a link.
    pub fn remove(&self, id: i64) -> Result<()> {
        self.update(id, |link| link.removed_at = Some(Utc::now()))
    }

    /// Mutate a record in place.
    pub fn update(&self, id: i64, f: impl FnOnce(&mut LinkRecord)) -> Result<()> {
        let mut inner = self.inner.lock();
        let link = inner.links.get_mut(&id).ok_or(AppError::NotFound(id))?;
        f(link);
        Ok(())
    }
}

#[async_trait]
impl LinkStore for MemoryLinkRepository {
    async fn find_link(&self, id: i64) -> Result<Option<LinkRecord>> {
        Ok(self.get(id).filter(|link| link.removed_at.is_none()))
    }

    async fn save_preview(&self, id: i64, cache: &PreviewCache) -> Result<()> {
        self.update(id, |link| {
            link.preview_payload = Some(cache.payload.clone());
            link.preview_status = Some(cache.status);
            link.preview_fetched_at = Some(cache.fetched_at);
            link.preview_expires_at = Some(cache.expires_at);
        })
    }
}

#[async_trait]
impl LeaseStore for MemoryLinkRepository {
    async fn claim_batch(
        &self,
        limit: i64,
        lock_token: &str,
        lease: Duration,
    ) -> Result<Vec<i64>> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let now = Utc::now();
        let locked_until = now
            .checked_add_signed(lease)
            .ok_or_else(|| AppError::validation(format!("lease of {lease} overflows")))?;
        let mut inner = self.inner.lock();

        let mut eligible: Vec<(DateTime<Utc>, i64)> = inner
            .links
            .values()
            .filter(|link| link.is_claimable(now))
            .map(|link| (link.stale_since(), link.id))
            .collect();
        eligible.sort();
        eligible.truncate(limit);

        let mut claimed = Vec::with_capacity(eligible.len());
        for (_, id) in eligible {
            if let Some(link) = inner.links.get_mut(&id) {
                link.lock_token = Some(lock_token.to_string());
                link.locked_until = Some(locked_until);
                claimed.push(id);
            }
        }
        Ok(claimed)
    }

    async fn release_lock(&self, id: i64, lock_token: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(link) = inner.links.get_mut(&id) {
            if link.lock_token.as_deref() == Some(lock_token) {
                link.lock_token = None;
                link.locked_until = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::models::PreviewStatus;

    fn seeded(count: usize) -> (MemoryLinkRepository, Vec<i64>) {
        let repo = MemoryLinkRepository::new();
        let base = Utc::now() - Duration::days(30);
        let ids = (0..count)
            .map(|i| {
                repo.insert_at(
                    &format!("https://shop{i}.example.com/item"),
                    base + Duration::minutes(i as i64),
                )
            })
            .collect();
        (repo, ids)
    }

    #[tokio::test]
    async fn test_claim_respects_limit_and_stamps_lease() {
        let (repo, ids) = seeded(5);
        let before = Utc::now();

        let claimed = repo
            .claim_batch(3, "token-a", Duration::seconds(120))
            .await
            .unwrap();

        assert_eq!(claimed, ids[..3].to_vec());
        for id in &claimed {
            let link = repo.get(*id).unwrap();
            assert_eq!(link.lock_token.as_deref(), Some("token-a"));
            let until = link.locked_until.unwrap();
            assert!(until >= before + Duration::seconds(120));
            assert!(until <= Utc::now() + Duration::seconds(120));
        }
        assert_eq!(repo.get(ids[3]).unwrap().lock_token, None);
    }

    #[tokio::test]
    async fn test_claim_orders_by_fetch_time_then_creation() {
        let (repo, ids) = seeded(3);
        let long_ago = Utc::now() - Duration::days(90);
        repo.update(ids[2], |link| {
            link.preview_fetched_at = Some(long_ago);
            link.preview_expires_at = Some(long_ago + Duration::hours(2));
        })
        .unwrap();

        let claimed = repo
            .claim_batch(10, "t", Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(claimed, vec![ids[2], ids[0], ids[1]]);
    }

    #[tokio::test]
    async fn test_claim_skips_removed_fresh_and_locked_links() {
        let (repo, ids) = seeded(4);
        let now = Utc::now();
        repo.remove(ids[0]).unwrap();
        repo.update(ids[1], |link| link.preview_expires_at = Some(now + Duration::days(1)))
            .unwrap();
        repo.update(ids[2], |link| {
            link.lock_token = Some("other".into());
            link.locked_until = Some(now + Duration::minutes(5));
        })
        .unwrap();

        let claimed = repo
            .claim_batch(10, "mine", Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(claimed, vec![ids[3]]);
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimable() {
        let (repo, ids) = seeded(1);
        repo.update(ids[0], |link| {
            link.lock_token = Some("crashed-worker".into());
            link.locked_until = Some(Utc::now() - Duration::seconds(1));
        })
        .unwrap();

        let claimed = repo
            .claim_batch(1, "next", Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(claimed, ids);
        assert_eq!(repo.get(ids[0]).unwrap().lock_token.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_overflowing_lease_is_an_error() {
        let (repo, ids) = seeded(1);

        let result = repo
            .claim_batch(1, "t", Duration::days(100_000_000))
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(repo.get(ids[0]).unwrap().lock_token, None);
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_disjoint() {
        let (repo, _) = seeded(20);
        let repo = Arc::new(repo);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.claim_batch(7, &format!("worker-{i}"), Duration::seconds(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for id in handle.await.unwrap() {
                total += 1;
                assert!(seen.insert(id), "id {id} claimed twice");
            }
        }
        assert_eq!(total, 20);
    }

    #[tokio::test]
    async fn test_release_requires_matching_token() {
        let (repo, ids) = seeded(1);
        repo.claim_batch(1, "token-b", Duration::seconds(60))
            .await
            .unwrap();

        repo.release_lock(ids[0], "token-a").await.unwrap();
        let link = repo.get(ids[0]).unwrap();
        assert_eq!(link.lock_token.as_deref(), Some("token-b"));
        assert!(link.locked_until.is_some());

        repo.release_lock(ids[0], "token-b").await.unwrap();
        let link = repo.get(ids[0]).unwrap();
        assert_eq!(link.lock_token, None);
        assert_eq!(link.locked_until, None);

        // already released
        repo.release_lock(ids[0], "token-b").await.unwrap();
        repo.release_lock(999, "token-b").await.unwrap();
    }

    #[tokio::test]
    async fn test_find_hides_removed_links_and_save_updates_cache() {
        let (repo, ids) = seeded(2);
        repo.remove(ids[1]).unwrap();
        assert!(repo.find_link(ids[1]).await.unwrap().is_none());

        let now = Utc::now();
        let cache = PreviewCache {
            payload: serde_json::json!({"status": "ok"}),
            status: PreviewStatus::Ok,
            fetched_at: now,
            expires_at: now + Duration::days(7),
        };
        repo.save_preview(ids[0], &cache).await.unwrap();

        let link = repo.find_link(ids[0]).await.unwrap().unwrap();
        assert_eq!(link.preview_status, Some(PreviewStatus::Ok));
        assert_eq!(link.preview_expires_at, Some(now + Duration::days(7)));
        assert!(matches!(
            repo.save_preview(404, &cache).await,
            Err(AppError::NotFound(404))
        ));
    }
}
