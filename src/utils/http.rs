// src/utils/http.rs

//! HTTP transport used by the fetch orchestrator.
//!
//! The orchestrator only sees [`HttpTransport`]; [`ReqwestTransport`] is the
//! production implementation.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

use crate::error::Result;
use crate::models::FetchConfig;
use crate::services::validator::is_blocked_ip;

/// A named set of request headers used for one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProfile {
    pub name: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
}

/// Response of a single attempt, body already capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub final_url: String,
    pub body: String,
    pub truncated: bool,
}

/// Transport-level failure (DNS, connect, TLS, timeout, redirect policy).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Heuristic: anti-bot mitigation usually shows up as a stalled request.
    pub fn looks_like_timeout(&self) -> bool {
        let message = self.message.to_lowercase();
        message.contains("timeout") || message.contains("timed out")
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(format!("request timed out: {err}"))
        } else {
            Self::new(format!("request failed: {err}"))
        }
    }
}

/// Issues a single GET for the fetch orchestrator.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        profile: &FetchProfile,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with redirect, timeout and body-size bounds.
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_duration: Duration,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            max_duration: config.max_duration(),
            max_body_bytes: config.max_body_bytes,
        })
    }

    async fn send(
        &self,
        url: &str,
        profile: &FetchProfile,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut response = self
            .client
            .get(url)
            .headers(profile_headers(profile))
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        // Callers discard error and non-HTML bodies, so skip reading them.
        if status >= 400 || !content_type.as_deref().is_none_or(is_html_content_type) {
            return Ok(TransportResponse {
                status,
                content_type,
                final_url,
                body: String::new(),
                truncated: false,
            });
        }

        let mut bytes: Vec<u8> = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = response.chunk().await? {
            let remaining = self.max_body_bytes - bytes.len();
            if chunk.len() >= remaining {
                bytes.extend_from_slice(&chunk[..remaining]);
                truncated = chunk.len() > remaining;
                if !truncated {
                    truncated = response.chunk().await?.is_some_and(|c| !c.is_empty());
                }
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status,
            content_type,
            final_url,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            truncated,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        profile: &FetchProfile,
    ) -> std::result::Result<TransportResponse, TransportError> {
        match tokio::time::timeout(self.max_duration, self.send(url, profile)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(format!(
                "request timed out after {}s",
                self.max_duration.as_secs()
            ))),
        }
    }
}

/// Create the shared asynchronous HTTP client.
pub fn create_async_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .redirect(redirect_policy(config.max_redirects))
        .timeout(config.timeout())
        .read_timeout(config.idle_timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()?;
    Ok(client)
}

/// Follow up to `max` redirects, refusing obviously internal targets.
///
/// Hostnames are not re-resolved here; only the initial URL goes through
/// the full DNS check.
fn redirect_policy(max: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            return attempt.error(format!("too many redirects (max {max})"));
        }
        let next = attempt.url();
        if !matches!(next.scheme(), "http" | "https") {
            return attempt.error("redirect to non-http scheme blocked");
        }
        if redirect_host_is_blocked(next) {
            return attempt.error("redirect to private address blocked");
        }
        attempt.follow()
    })
}

fn redirect_host_is_blocked(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Ipv4(ip)) => is_blocked_ip(IpAddr::V4(ip)),
        Some(url::Host::Ipv6(ip)) => is_blocked_ip(IpAddr::V6(ip)),
        Some(url::Host::Domain(domain)) => {
            let domain = domain.to_ascii_lowercase();
            domain == "localhost" || domain == "localhost.localdomain"
        }
        None => true,
    }
}

fn profile_headers(profile: &FetchProfile) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in profile.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    headers
}

/// Whether a `Content-Type` header value denotes an HTML document.
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}
