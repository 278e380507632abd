// src/lib.rs

//! Link preview library
//!
//! Fetches, validates, extracts and caches preview cards for user-saved
//! links, and leases stale links to batch workers for background refresh.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
