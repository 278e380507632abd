//! Pipeline entry points for preview operations.
//!
//! - `fetch_preview`: Serve one link's preview, from cache when fresh
//! - `process_link_previews`: Lease a batch of stale links and refresh them

pub mod batch;
pub mod single;

pub use batch::{BatchTally, process_link_previews};
pub use single::fetch_preview;
