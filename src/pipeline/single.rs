// src/pipeline/single.rs

//! Single-link preview command.

use crate::error::Result;
use crate::models::FetchOutcome;
use crate::services::PreviewService;

/// Serve the preview for one link.
pub async fn fetch_preview(service: &PreviewService, link_id: i64) -> Result<FetchOutcome> {
    log::info!("Fetching preview for link {}", link_id);
    let outcome = service.get_or_fetch(link_id).await?;

    for warning in &outcome.warnings {
        log::debug!("Link {}: {}", link_id, warning);
    }
    Ok(outcome)
}
