// src/models/link.rs

//! Stored link records and the preview cache fields they carry.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Classification of a fetch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Ok,
    Blocked,
    Failed,
}

impl PreviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewStatus::Ok => "ok",
            PreviewStatus::Blocked => "blocked",
            PreviewStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreviewStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(PreviewStatus::Ok),
            "blocked" => Ok(PreviewStatus::Blocked),
            "failed" => Ok(PreviewStatus::Failed),
            other => Err(AppError::validation(format!(
                "unknown preview status '{other}'"
            ))),
        }
    }
}

/// A user-submitted link with its cache and lease fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub id: i64,

    /// URL as entered by the user
    pub url: String,

    /// Lowercase host with `www.` stripped
    pub domain: String,

    /// `host_profiles` row owned by the main application; not read here
    pub host_profile_id: Option<i64>,
    pub created_at: DateTime<Utc>,

    /// Soft-delete marker; removed links are never processed
    pub removed_at: Option<DateTime<Utc>>,

    /// Serialized `FetchOutcome`
    pub preview_payload: Option<serde_json::Value>,
    pub preview_status: Option<PreviewStatus>,
    pub preview_fetched_at: Option<DateTime<Utc>>,
    pub preview_expires_at: Option<DateTime<Utc>>,

    /// Lease ownership, only meaningful while `locked_until` is in the future
    pub lock_token: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LinkRecord {
    /// Whether the cached preview may still be served at `now`.
    pub fn has_fresh_preview(&self, now: DateTime<Utc>) -> bool {
        match (&self.preview_payload, self.preview_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }

    /// Whether a batch claim may pick this record at `now`.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.removed_at.is_none()
            && self.preview_expires_at.is_none_or(|at| at <= now)
            && self.locked_until.is_none_or(|at| at <= now)
    }

    /// Timestamp used to order claims, oldest first.
    pub fn stale_since(&self) -> DateTime<Utc> {
        self.preview_fetched_at.unwrap_or(self.created_at)
    }
}

/// Cache columns written after a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewCache {
    pub payload: serde_json::Value,
    pub status: PreviewStatus,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(now: DateTime<Utc>) -> LinkRecord {
        LinkRecord {
            id: 1,
            url: "https://example.com/p".into(),
            domain: "example.com".into(),
            host_profile_id: None,
            created_at: now - Duration::days(1),
            removed_at: None,
            preview_payload: None,
            preview_status: None,
            preview_fetched_at: None,
            preview_expires_at: None,
            lock_token: None,
            locked_until: None,
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [PreviewStatus::Ok, PreviewStatus::Blocked, PreviewStatus::Failed] {
            assert_eq!(status.as_str().parse::<PreviewStatus>().unwrap(), status);
        }
        assert!("pending".parse::<PreviewStatus>().is_err());
    }

    #[test]
    fn test_claimable_rules() {
        let now = Utc::now();
        let mut link = record(now);
        assert!(link.is_claimable(now));

        link.locked_until = Some(now + Duration::seconds(30));
        assert!(!link.is_claimable(now));

        link.locked_until = Some(now - Duration::seconds(1));
        assert!(link.is_claimable(now));

        link.preview_expires_at = Some(now + Duration::hours(1));
        assert!(!link.is_claimable(now));

        link.preview_expires_at = Some(now);
        assert!(link.is_claimable(now));

        link.removed_at = Some(now);
        assert!(!link.is_claimable(now));
    }

    #[test]
    fn test_fresh_preview_requires_payload_and_future_expiry() {
        let now = Utc::now();
        let mut link = record(now);
        link.preview_expires_at = Some(now + Duration::hours(1));
        assert!(!link.has_fresh_preview(now));

        link.preview_payload = Some(serde_json::json!({"status": "ok"}));
        assert!(link.has_fresh_preview(now));

        link.preview_expires_at = Some(now - Duration::seconds(1));
        assert!(!link.has_fresh_preview(now));
    }
}
