// src/services/fetcher.rs

//! Fetch orchestrator.
//!
//! Normalizes and validates a URL, then tries each header profile in turn.
//! Only a `blocked` attempt moves on to the next profile.

use std::sync::Arc;

use crate::models::{FetchOutcome, PreviewStatus};
use crate::services::extractor;
use crate::services::validator::UrlValidator;
use crate::utils::http::{
    FetchProfile, HttpTransport, TransportError, TransportResponse, is_html_content_type,
};
use crate::utils::url::normalize_url_for_fetch;

/// Desktop browser headers, tried first.
pub const DESKTOP_PROFILE: FetchProfile = FetchProfile {
    name: "desktop",
    headers: &[
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "none"),
        ("Sec-Fetch-User", "?1"),
        ("Upgrade-Insecure-Requests", "1"),
    ],
};

/// Mobile browser headers, used when the desktop attempt is blocked.
pub const MOBILE_PROFILE: FetchProfile = FetchProfile {
    name: "mobile",
    headers: &[
        (
            "User-Agent",
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-GB,en;q=0.8"),
        ("Sec-Fetch-Dest", "document"),
        ("Sec-Fetch-Mode", "navigate"),
        ("Sec-Fetch-Site", "cross-site"),
    ],
};

/// Issues outbound requests and classifies what came back.
pub struct PreviewFetcher {
    transport: Arc<dyn HttpTransport>,
    validator: UrlValidator,
    profiles: Vec<FetchProfile>,
}

impl PreviewFetcher {
    /// Create a fetcher using the desktop and mobile profiles.
    pub fn new(transport: Arc<dyn HttpTransport>, validator: UrlValidator) -> Self {
        Self::with_profiles(transport, validator, vec![DESKTOP_PROFILE, MOBILE_PROFILE])
    }

    pub fn with_profiles(
        transport: Arc<dyn HttpTransport>,
        validator: UrlValidator,
        profiles: Vec<FetchProfile>,
    ) -> Self {
        Self {
            transport,
            validator,
            profiles,
        }
    }

    pub fn validator(&self) -> &UrlValidator {
        &self.validator
    }

    /// Normalize, validate and fetch a URL.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let normalized = normalize_url_for_fetch(url);
        if let Err(e) = self.validator.validate(&normalized).await {
            log::info!("Rejected {}: {}", normalized, e);
            return FetchOutcome::failed(normalized, e.to_string());
        }
        self.fetch_validated(&normalized).await
    }

    /// Fetch an already normalized and validated URL.
    pub(crate) async fn fetch_validated(&self, url: &str) -> FetchOutcome {
        let mut last_blocked = None;

        for profile in &self.profiles {
            let outcome = classify(url, self.transport.get(url, profile).await);
            log::debug!(
                "Profile '{}' for {} finished as {}",
                profile.name,
                url,
                outcome.status
            );

            if outcome.status != PreviewStatus::Blocked {
                return outcome;
            }
            last_blocked = Some(outcome);
        }

        last_blocked.unwrap_or_else(|| FetchOutcome::failed(url, "No fetch profiles configured"))
    }
}

/// Turn a single attempt into an outcome.
fn classify(
    url: &str,
    attempt: Result<TransportResponse, TransportError>,
) -> FetchOutcome {
    let response = match attempt {
        Ok(response) => response,
        Err(e) => {
            let status = if e.looks_like_timeout() {
                PreviewStatus::Blocked
            } else {
                PreviewStatus::Failed
            };
            return FetchOutcome::without_preview(status, url, None, e.to_string());
        }
    };

    if response.status >= 400 {
        let status = match response.status {
            403 | 429 => PreviewStatus::Blocked,
            _ => PreviewStatus::Failed,
        };
        return FetchOutcome::without_preview(
            status,
            url,
            Some(response.final_url),
            format!("HTTP status {}", response.status),
        );
    }

    if let Some(content_type) = response.content_type.as_deref() {
        if !is_html_content_type(content_type) {
            return FetchOutcome::without_preview(
                PreviewStatus::Failed,
                url,
                Some(response.final_url),
                format!("Unsupported content type: {content_type}"),
            );
        }
    }

    let extraction = extractor::extract(&response.body, &response.final_url);
    let mut warnings = extraction.warnings;
    if response.truncated {
        warnings.push("Response body truncated".to_string());
    }

    FetchOutcome {
        status: PreviewStatus::Ok,
        url: url.to_string(),
        final_url: Some(response.final_url),
        preview: extraction.preview,
        product: extraction.product,
        warnings,
    }
}
