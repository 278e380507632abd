// src/models/mod.rs

//! Domain models for the link preview service.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod link;
mod outcome;

// Re-export all public types
pub use config::{
    BatchConfig, CacheConfig, Config, DATABASE_URL_ENV, DatabaseConfig, FetchConfig,
    MAX_BATCH_LIMIT, MAX_LOCK_SECONDS, MAX_TTL_SECS,
};
pub use link::{LinkRecord, PreviewCache, PreviewStatus};
pub use outcome::{FetchOutcome, Preview, Product};
