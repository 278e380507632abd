// src/services/validator.rs

//! URL safety validation.
//!
//! Runs before any outbound request. Rules are checked in order and the
//! first failure wins; a host that cannot be resolved is rejected.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use ipnet::IpNet;
use thiserror::Error;
use url::{Host, Url};

/// Longest URL accepted, in bytes.
pub const MAX_URL_LENGTH: usize = 800;

/// Why a URL was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("URL is empty")]
    Empty,

    #[error("URL exceeds {MAX_URL_LENGTH} characters")]
    TooLong,

    #[error("URL could not be parsed")]
    Unparsable,

    #[error("URL scheme '{0}' is not allowed")]
    Scheme(String),

    #[error("URLs with embedded credentials are not allowed")]
    Credentials,

    #[error("URL has no host")]
    MissingHost,

    #[error("Host '{0}' is blocked")]
    BlockedHost(String),

    #[error("Host '{0}' points to a private or reserved address")]
    PrivateAddress(String),

    #[error("Host '{0}' could not be resolved")]
    Unresolvable(String),
}

/// DNS lookup for A/AAAA records.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Rejects URLs that are malformed or point at internal infrastructure.
#[derive(Clone)]
pub struct UrlValidator {
    resolver: Arc<dyn Resolver>,
}

impl UrlValidator {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Validate a URL; `Ok(())` means it is safe to request.
    pub async fn validate(&self, url: &str) -> Result<(), ValidationError> {
        if url.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        if url.len() > MAX_URL_LENGTH {
            return Err(ValidationError::TooLong);
        }

        let parsed = Url::parse(url).map_err(|_| ValidationError::Unparsable)?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ValidationError::Scheme(parsed.scheme().to_string()));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(ValidationError::Credentials);
        }

        match parsed.host() {
            None => Err(ValidationError::MissingHost),
            Some(Host::Ipv4(ip)) => check_literal(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => check_literal(IpAddr::V6(ip)),
            Some(Host::Domain(domain)) => self.check_domain(domain).await,
        }
    }

    async fn check_domain(&self, domain: &str) -> Result<(), ValidationError> {
        let host = domain.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return Err(ValidationError::MissingHost);
        }
        if host == "localhost" || host == "localhost.localdomain" {
            return Err(ValidationError::BlockedHost(host));
        }

        let addrs = match self.resolver.resolve(&host).await {
            Ok(addrs) => addrs,
            Err(e) => {
                log::debug!("DNS lookup failed for {}: {}", host, e);
                return Err(ValidationError::Unresolvable(host));
            }
        };
        if addrs.is_empty() {
            return Err(ValidationError::Unresolvable(host));
        }
        if let Some(addr) = addrs.iter().find(|addr| is_blocked_ip(**addr)) {
            log::debug!("{} resolves to blocked address {}", host, addr);
            return Err(ValidationError::PrivateAddress(host));
        }
        Ok(())
    }
}

fn check_literal(ip: IpAddr) -> Result<(), ValidationError> {
    if is_blocked_ip(ip) {
        Err(ValidationError::PrivateAddress(ip.to_string()))
    } else {
        Ok(())
    }
}

/// Private, loopback, link-local and otherwise reserved ranges.
const BLOCKED_RANGES: &[&str] = &[
    // IPv4
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10", // carrier-grade NAT
    "127.0.0.0/8",
    "169.254.0.0/16", // link-local, cloud metadata
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.88.99.0/24", // 6to4 relay
    "192.168.0.0/16",
    "198.18.0.0/15", // benchmarking
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4", // multicast
    "240.0.0.0/4", // reserved, broadcast
    // IPv6
    "::/128",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
    "fec0::/10",
    "ff00::/8",
    "2001:db8::/32",
    "64:ff9b::/96", // NAT64
];

static BLOCKED_NETS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    BLOCKED_RANGES
        .iter()
        .filter_map(|cidr| {
            cidr.parse::<IpNet>()
                .map_err(|e| log::error!("Invalid blocked range {}: {}", cidr, e))
                .ok()
        })
        .collect()
});

/// Whether an address is private, loopback, link-local or otherwise reserved.
///
/// IPv4-mapped and IPv4-compatible IPv6 addresses are checked as IPv4.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    let ip = embedded_ipv4(ip).map(IpAddr::V4).unwrap_or(ip);
    BLOCKED_NETS.iter().any(|net| net.contains(&ip))
}

fn embedded_ipv4(ip: IpAddr) -> Option<Ipv4Addr> {
    let IpAddr::V6(v6) = ip else {
        return None;
    };
    if let Some(v4) = v6.to_ipv4_mapped() {
        return Some(v4);
    }
    // ::a.b.c.d, except :: and ::1 which have their own entries
    let segments = v6.segments();
    if segments[..6].iter().all(|s| *s == 0) && !v6.is_unspecified() && !v6.is_loopback() {
        return Some(Ipv4Addr::from(v6.to_bits() as u32));
    }
    None
}
