//! Storage abstractions for link records.
//!
//! Two concerns are split into separate traits so the fetch path and the
//! batch lease path can be wired independently:
//!
//! - [`LinkStore`]: reads a link and writes its preview cache columns
//! - [`LeaseStore`]: claims and releases processing leases
//!
//! Backends:
//!
//! - [`PostgresLinkRepository`]: production backend (feature `postgres`)
//! - [`MemoryLinkRepository`]: in-process backend for tests and local runs

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::Duration;

use crate::error::Result;
use crate::models::{LinkRecord, PreviewCache};

// Re-export for convenience
pub use memory::MemoryLinkRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLinkRepository;

/// Read access to links and write access to their cache columns.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Load a live link; soft-removed links are reported as `None`.
    async fn find_link(&self, id: i64) -> Result<Option<LinkRecord>>;

    /// Overwrite the preview cache columns of a link.
    async fn save_preview(&self, id: i64, cache: &PreviewCache) -> Result<()>;
}

/// Lease coordination between concurrent batch workers.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically lease up to `limit` eligible links, oldest first.
    ///
    /// Rows leased by a concurrent caller are skipped, never waited on.
    async fn claim_batch(&self, limit: i64, lock_token: &str, lease: Duration)
    -> Result<Vec<i64>>;

    /// Clear the lease if `lock_token` still owns it; otherwise do nothing.
    async fn release_lock(&self, id: i64, lock_token: &str) -> Result<()>;
}
