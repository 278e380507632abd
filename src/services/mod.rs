//! Service layer for the link preview pipeline.
//!
//! This module contains the business logic for:
//! - URL safety validation (`UrlValidator`)
//! - Preview fetching with profile fallback (`PreviewFetcher`)
//! - HTML and JSON-LD extraction (`extract`)
//! - Cache writes with status-dependent TTLs (`CacheWriter`)
//! - Batch lease management (`JobClaimer`)
//! - Cache-aware composition of the above (`PreviewService`)

pub mod cache;
pub mod claimer;
pub mod extractor;
pub mod fetcher;
pub mod preview;
pub mod validator;

pub use cache::CacheWriter;
pub use claimer::JobClaimer;
pub use extractor::{Extraction, extract};
pub use fetcher::{DESKTOP_PROFILE, MOBILE_PROFILE, PreviewFetcher};
pub use preview::PreviewService;
pub use validator::{Resolver, SystemResolver, UrlValidator, ValidationError};
