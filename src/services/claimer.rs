//! Job claimer.
//!
//! Leases batches of stale links to one worker at a time. Coordination is
//! entirely storage-mediated; a crashed worker's lease simply expires.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::MAX_LOCK_SECONDS;
use crate::storage::LeaseStore;

/// Claims and releases link leases.
pub struct JobClaimer {
    store: Arc<dyn LeaseStore>,
}

impl JobClaimer {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    /// A fresh, unpredictable lease token (random 128-bit UUID).
    pub fn new_lock_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Lease up to `limit` eligible links for `lease_seconds`.
    ///
    /// An empty batch is a normal result. A lease outside
    /// `1..=MAX_LOCK_SECONDS` is a validation error.
    pub async fn claim_batch(
        &self,
        limit: i64,
        lock_token: &str,
        lease_seconds: i64,
    ) -> Result<Vec<i64>> {
        if !(1..=MAX_LOCK_SECONDS).contains(&lease_seconds) {
            return Err(AppError::validation(format!(
                "lease of {lease_seconds}s is outside 1..={MAX_LOCK_SECONDS}"
            )));
        }
        let lease = Duration::try_seconds(lease_seconds)
            .ok_or_else(|| AppError::validation(format!("lease of {lease_seconds}s overflows")))?;
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let ids = self.store.claim_batch(limit, lock_token, lease).await?;
        log::info!(
            "Claimed {} link(s) with token {} for {}s",
            ids.len(),
            lock_token,
            lease_seconds
        );
        Ok(ids)
    }

    /// Release a lease; a token mismatch is silently ignored.
    pub async fn release_preview_lock(&self, id: i64, lock_token: &str) -> Result<()> {
        self.store.release_lock(id, lock_token).await
    }
}
