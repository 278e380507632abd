// src/services/extractor.rs

//! Preview and product extraction from fetched HTML.
//!
//! Pure functions, no I/O. Malformed markup is tolerated; the only parse
//! failure reported is an empty document.

use std::collections::HashMap;

use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::models::{Preview, Product};
use crate::utils::url::{derive_domain, resolve};

/// Warning attached when the body holds no document at all.
pub const EMPTY_DOCUMENT_WARNING: &str = "HTML parse failed: empty document";

const ICON_RELS: [&str; 3] = ["icon", "shortcut icon", "apple-touch-icon"];

/// Everything pulled out of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub preview: Preview,
    pub product: Option<Product>,
    pub warnings: Vec<String>,
}

/// Extract preview fields and product data from an HTML body.
pub fn extract(html: &str, final_url: &str) -> Extraction {
    if html.trim().is_empty() {
        return Extraction {
            warnings: vec![EMPTY_DOCUMENT_WARNING.to_string()],
            ..Extraction::default()
        };
    }

    let document = Html::parse_document(html);
    let base = Url::parse(final_url).ok();
    let meta = collect_meta(&document);
    let lookup = |keys: &[&str]| keys.iter().find_map(|k| meta.get(*k).cloned());

    let title = lookup(&["og:title", "twitter:title"]).or_else(|| title_tag(&document));
    let description = lookup(&["og:description", "twitter:description", "description"]);
    let image_url = lookup(&["og:image", "twitter:image"]).map(|raw| absolutize(base.as_ref(), &raw));
    let site_name = lookup(&["og:site_name"]).or_else(|| derive_domain(final_url));
    let favicon_url = favicon(&document, base.as_ref());

    Extraction {
        preview: Preview {
            title,
            description,
            image_url,
            site_name,
            favicon_url,
        },
        product: extract_product(&document, base.as_ref()),
        warnings: Vec::new(),
    }
}

/// First `content` per lowercased `property`/`name` key.
fn collect_meta(document: &Html) -> HashMap<String, String> {
    let mut meta = HashMap::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return meta;
    };

    for element in document.select(&selector) {
        let el = element.value();
        let Some(key) = el.attr("property").or_else(|| el.attr("name")) else {
            continue;
        };
        let Some(content) = el.attr("content").and_then(clean_text) else {
            continue;
        };
        meta.entry(key.trim().to_lowercase()).or_insert(content);
    }
    meta
}

fn title_tag(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let element = document.select(&selector).next()?;
    clean_text(&element.text().collect::<String>())
}

fn favicon(document: &Html, base: Option<&Url>) -> Option<String> {
    let base = base?;
    let declared = Selector::parse("link[rel][href]").ok().and_then(|selector| {
        document.select(&selector).find_map(|element| {
            let el = element.value();
            let rel = normalize_whitespace(el.attr("rel")?).to_lowercase();
            if !ICON_RELS.contains(&rel.as_str()) {
                return None;
            }
            resolve(base, el.attr("href")?)
        })
    });

    declared.or_else(|| base.join("/favicon.ico").ok().map(|u| u.to_string()))
}

fn extract_product(document: &Html, base: Option<&Url>) -> Option<Product> {
    let selector = Selector::parse("script[type]").ok()?;

    document
        .select(&selector)
        .filter(|script| {
            script
                .value()
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
        })
        .filter_map(|script| {
            let text = script.text().collect::<String>();
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::debug!("Skipping invalid JSON-LD block: {}", e);
                    None
                }
            }
        })
        .find_map(|value| find_product(&value).map(|node| product_from_node(node, base)))
}

/// First node typed `Product`, searching arrays and `@graph` containers.
fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if map.get("@type").is_some_and(|t| matches_type(t, "Product")) {
                return Some(value);
            }
            map.get("@graph").and_then(find_product)
        }
        Value::Array(items) => items.iter().find_map(find_product),
        _ => None,
    }
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case(expected),
        Value::Array(items) => items.iter().any(|v| matches_type(v, expected)),
        _ => false,
    }
}

fn product_from_node(node: &Value, base: Option<&Url>) -> Product {
    let offer = match node.get("offers") {
        Some(Value::Array(offers)) => offers.first(),
        Some(offer @ Value::Object(_)) => Some(offer),
        _ => None,
    };

    let price = offer.and_then(|o| {
        o.get("price")
            .and_then(scalar_to_string)
            .or_else(|| o.get("lowPrice").and_then(scalar_to_string))
    });
    let currency = offer
        .and_then(|o| o.get("priceCurrency"))
        .and_then(scalar_to_string);

    Product {
        name: node.get("name").and_then(scalar_to_string),
        price,
        currency,
        image_url: node
            .get("image")
            .and_then(first_image)
            .map(|raw| absolutize(base, &raw)),
    }
}

fn first_image(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Array(items) => items.first().and_then(first_image),
        Value::Object(map) => map.get("url").and_then(first_image),
        _ => None,
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn absolutize(base: Option<&Url>, raw: &str) -> String {
    base.and_then(|b| resolve(b, raw))
        .unwrap_or_else(|| raw.to_string())
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_text(s: &str) -> Option<String> {
    let cleaned = normalize_whitespace(s);
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://www.example.com/products/widget";

    #[test]
    fn test_og_title_wins() {
        let html = r#"<html><head>
            <meta property="og:title" content="Widget">
            <meta name="twitter:title" content="Widget (Twitter)">
            <title>Widget | Example Shop</title>
        </head></html>"#;

        let result = extract(html, PAGE_URL);
        assert_eq!(result.preview.title.as_deref(), Some("Widget"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_fallback_chain_for_title_and_description() {
        let html = r#"<html><head>
            <meta name="twitter:description" content="From twitter">
            <meta name="description" content="Plain description">
            <title>
                Widget   Deluxe
            </title>
        </head></html>"#;

        let result = extract(html, PAGE_URL);
        assert_eq!(result.preview.title.as_deref(), Some("Widget Deluxe"));
        assert_eq!(result.preview.description.as_deref(), Some("From twitter"));
    }

    #[test]
    fn test_meta_description_used_last() {
        let html = r#"<head><meta name="description" content="  Plain  "></head>"#;
        let result = extract(html, PAGE_URL);
        assert_eq!(result.preview.description.as_deref(), Some("Plain"));
    }

    #[test]
    fn test_images_resolve_against_final_url() {
        let relative = r#"<head><meta property="og:image" content="/img/w.png"></head>"#;
        assert_eq!(
            extract(relative, PAGE_URL).preview.image_url.as_deref(),
            Some("https://www.example.com/img/w.png")
        );

        let protocol_relative =
            r#"<head><meta name="twitter:image" content="//cdn.example.net/w.png"></head>"#;
        assert_eq!(
            extract(protocol_relative, PAGE_URL).preview.image_url.as_deref(),
            Some("https://cdn.example.net/w.png")
        );
    }

    #[test]
    fn test_site_name_falls_back_to_host() {
        let result = extract("<p>hi</p>", PAGE_URL);
        assert_eq!(result.preview.site_name.as_deref(), Some("example.com"));

        let named = r#"<meta property="og:site_name" content="Example Shop">"#;
        assert_eq!(
            extract(named, PAGE_URL).preview.site_name.as_deref(),
            Some("Example Shop")
        );
    }

    #[test]
    fn test_favicon_from_link_or_default() {
        let html = r#"<head>
            <link rel="stylesheet" href="/site.css">
            <link rel="Shortcut Icon" href="static/fav.png">
            <link rel="icon" href="/other.ico">
        </head>"#;
        assert_eq!(
            extract(html, PAGE_URL).preview.favicon_url.as_deref(),
            Some("https://www.example.com/products/static/fav.png")
        );

        assert_eq!(
            extract("<p>no icon</p>", PAGE_URL).preview.favicon_url.as_deref(),
            Some("https://www.example.com/favicon.ico")
        );
    }

    #[test]
    fn test_json_ld_product_with_offer_array() {
        let html = r#"<script type="application/ld+json">
            {"@context":"https://schema.org","@type":"Product","name":"Widget",
             "image":["/img/a.jpg","/img/b.jpg"],
             "offers":[{"price":"19.99","priceCurrency":"USD"}]}
        </script>"#;

        let product = extract(html, PAGE_URL).product.unwrap();
        assert_eq!(product.name.as_deref(), Some("Widget"));
        assert_eq!(product.price.as_deref(), Some("19.99"));
        assert_eq!(product.currency.as_deref(), Some("USD"));
        assert_eq!(
            product.image_url.as_deref(),
            Some("https://www.example.com/img/a.jpg")
        );
    }

    #[test]
    fn test_json_ld_product_in_graph_with_type_array() {
        let html = r#"
            <script type="application/ld+json">not json at all</script>
            <script type="application/ld+json">
            {"@graph":[
                {"@type":"WebPage","name":"Page"},
                {"@type":["Thing","product"],"name":"Lamp",
                 "image":{"@type":"ImageObject","url":"https://img.example.com/l.jpg"},
                 "offers":{"@type":"Offer","price":42.5,"priceCurrency":"EUR"}}
            ]}
            </script>"#;

        let product = extract(html, PAGE_URL).product.unwrap();
        assert_eq!(product.name.as_deref(), Some("Lamp"));
        assert_eq!(product.price.as_deref(), Some("42.5"));
        assert_eq!(product.currency.as_deref(), Some("EUR"));
        assert_eq!(
            product.image_url.as_deref(),
            Some("https://img.example.com/l.jpg")
        );
    }

    #[test]
    fn test_aggregate_offer_uses_low_price() {
        let html = r#"<script type="application/ld+json">
            [{"@type":"Product","name":"Mug",
              "offers":{"@type":"AggregateOffer","lowPrice":"7.00","priceCurrency":"GBP"}}]
        </script>"#;

        let product = extract(html, PAGE_URL).product.unwrap();
        assert_eq!(product.price.as_deref(), Some("7.00"));
        assert_eq!(product.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_no_product_without_json_ld() {
        assert!(extract("<p>plain</p>", PAGE_URL).product.is_none());
    }

    #[test]
    fn test_malformed_markup_is_tolerated() {
        let html = r#"<html><head><meta property="og:title" content="Broken"<title>x</head><body><div><p>"#;
        let result = extract(html, PAGE_URL);
        assert!(result.warnings.is_empty());
        assert_eq!(result.preview.site_name.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_empty_document_yields_empty_fields_and_warning() {
        let result = extract("   \n ", PAGE_URL);
        assert_eq!(result.preview, Preview::default());
        assert!(result.product.is_none());
        assert_eq!(result.warnings, vec![EMPTY_DOCUMENT_WARNING.to_string()]);
    }
}
