// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Query keys that identify a product or variant and survive normalization.
///
/// Everything else (utm_*, click ids, referral tags) is dropped.
pub const PRESERVED_QUERY_KEYS: [&str; 4] = ["offerId", "item_id", "variant", "th"];

/// Rewrite a URL to scheme, host, port, path and allow-listed query pairs.
///
/// The result doubles as the cache key. Input that does not parse is
/// returned trimmed so the validator can reject it with a proper message.
///
/// # Examples
/// ```
/// use link_preview::utils::url::normalize_url_for_fetch;
///
/// assert_eq!(
///     normalize_url_for_fetch("https://Shop.example.com/p/1?utm_source=x&variant=red#top"),
///     "https://shop.example.com/p/1?variant=red"
/// );
/// ```
pub fn normalize_url_for_fetch(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_string();
    };

    let mut normalized = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(parsed.path());

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| PRESERVED_QUERY_KEYS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        normalized.push('?');
        normalized.push_str(&query);
    }

    normalized
}

/// Lowercase host of a URL with a leading `www.` removed.
///
/// # Examples
/// ```
/// use link_preview::utils::url::derive_domain;
///
/// assert_eq!(
///     derive_domain("https://WWW.Example.com/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn derive_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    Some(host.to_string())
}

/// Resolve a possibly relative or protocol-relative reference against a base.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
