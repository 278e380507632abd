// src/pipeline/batch.rs

//! Batch preview refresh.
//!
//! Leases up to `limit` stale links under a fresh token, force-refetches them
//! in claim order, and releases every lease afterwards. One bad link never
//! stops the sweep.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::models::PreviewStatus;
use crate::services::{JobClaimer, PreviewService};

/// Per-status counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub ok: usize,
    pub blocked: usize,
    pub failed: usize,
}

impl BatchTally {
    pub fn record(&mut self, status: PreviewStatus) {
        match status {
            PreviewStatus::Ok => self.ok += 1,
            PreviewStatus::Blocked => self.blocked += 1,
            PreviewStatus::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for BatchTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ok={} blocked={} failed={}",
            self.ok, self.blocked, self.failed
        )
    }
}

/// Run one best-effort refresh sweep.
pub async fn process_link_previews(
    claimer: &JobClaimer,
    service: &PreviewService,
    limit: i64,
    lock_seconds: i64,
) -> BatchTally {
    let token = JobClaimer::new_lock_token();
    let mut tally = BatchTally::default();

    let ids = match claimer.claim_batch(limit, &token, lock_seconds).await {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("Failed to claim links: {}", e);
            return tally;
        }
    };

    for id in ids {
        let status = match AssertUnwindSafe(service.force_refetch(id))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome.status,
            Ok(Err(e)) => {
                log::error!("Link {} failed: {}", id, e);
                PreviewStatus::Failed
            }
            Err(_) => {
                log::error!("Link {} panicked during refresh", id);
                PreviewStatus::Failed
            }
        };
        tally.record(status);

        if let Err(e) = claimer.release_preview_lock(id, &token).await {
            log::warn!("Failed to release lease on link {}: {}", id, e);
        }
    }

    log::info!("Batch complete: {}", tally);
    tally
}
