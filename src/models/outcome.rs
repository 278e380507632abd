//! Fetch outcome shape, persisted as the link's preview payload.

use serde::{Deserialize, Serialize};

use super::PreviewStatus;

/// Preview card fields extracted from a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub site_name: Option<String>,
    pub favicon_url: Option<String>,
}

/// schema.org `Product` data found in JSON-LD.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub name: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub image_url: Option<String>,
}

/// Result of fetching one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub status: PreviewStatus,

    /// Normalized URL that was requested
    pub url: String,

    /// URL after redirects, when a response was received
    pub final_url: Option<String>,

    #[serde(default)]
    pub preview: Preview,

    #[serde(default)]
    pub product: Option<Product>,

    #[serde(default)]
    pub warnings: Vec<String>,
}

impl FetchOutcome {
    /// A terminal failure with a single warning.
    pub fn failed(url: impl Into<String>, warning: impl Into<String>) -> Self {
        Self::without_preview(PreviewStatus::Failed, url, None, warning)
    }

    /// An outcome that carries no extracted data.
    pub fn without_preview(
        status: PreviewStatus,
        url: impl Into<String>,
        final_url: Option<String>,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            status,
            url: url.into(),
            final_url,
            preview: Preview::default(),
            product: None,
            warnings: vec![warning.into()],
        }
    }

    /// Outcome for an id with no live record behind it.
    pub fn link_not_found() -> Self {
        Self::failed("", "Link not found")
    }
}
