//! Open Graph image discovery.
//!
//! Pure helpers for the `/api/fetch-og-image` proxy: target URL validation,
//! image candidate extraction from HTML, relative URL resolution and the
//! content-addressed file naming used for stored images.

use std::net::IpAddr;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

/// Largest image body the proxy will store.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const OG_PROPERTIES: [&str; 3] = ["og:image", "og:image:url", "og:image:secure_url"];

/// Every way an OG image request can fail. The display text is the message
/// returned to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OgImageError {
    #[error("The url parameter is required")]
    MissingUrl,

    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Failed to fetch target page")]
    FetchFailed,

    #[error("No image found on target page")]
    NoImage,

    #[error("Failed to download image")]
    DownloadFailed,

    #[error("Resolved resource is not an image")]
    NotAnImage,

    #[error("Image exceeds maximum size")]
    TooLarge,

    #[error("Failed to store image")]
    Storage,
}

fn tag_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>")).expect("static tag regex")
}

fn meta_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| tag_pattern("meta"))
}

fn img_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| tag_pattern("img"))
}

fn attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)([a-zA-Z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("static attribute regex")
    })
}

/// Find the value of `name` in a single tag, case-insensitively.
fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    attr_regex().captures_iter(tag).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
    })
}

/// Decode the handful of entities that show up in attribute URLs.
pub fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#47;", "/")
        .replace("&#x2F;", "/")
        .replace("&#x2f;", "/")
        .replace("&amp;", "&")
}

/// Pick the image a page advertises: its `og:image` meta tag, else the first
/// `<img>` whose source is not an inline `data:` URI.
pub fn extract_image_candidate(html: &str) -> Option<String> {
    let from_meta = meta_regex().find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let key = attribute(tag, "property").or_else(|| attribute(tag, "name"))?;
        if !OG_PROPERTIES.iter().any(|p| key.trim().eq_ignore_ascii_case(p)) {
            return None;
        }
        let content = attribute(tag, "content")?.trim();
        (!content.is_empty()).then(|| decode_entities(content))
    });
    if from_meta.is_some() {
        return from_meta;
    }

    img_regex().find_iter(html).find_map(|m| {
        let src = attribute(m.as_str(), "src")?.trim();
        if src.is_empty() || src.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:")) {
            return None;
        }
        Some(decode_entities(src))
    })
}

/// Resolve an image reference found on `base` into an absolute http(s) URL.
///
/// Handles absolute, protocol-relative (`//cdn/x.png`), root-relative and
/// path-relative references.
pub fn resolve_image_url(base: &Url, candidate: &str) -> Option<Url> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let resolved = if let Some(rest) = candidate.strip_prefix("//") {
        Url::parse(&format!("{}://{}", base.scheme(), rest)).ok()?
    } else {
        base.join(candidate).ok()?
    };
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Validate the user-supplied target page URL.
pub fn parse_target_url(raw: Option<&str>) -> Result<Url, OgImageError> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return Err(OgImageError::MissingUrl);
    }
    let parsed = Url::parse(raw).map_err(|_| OgImageError::InvalidUrl)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(OgImageError::InvalidUrl);
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(OgImageError::InvalidUrl);
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(OgImageError::InvalidUrl);
    }
    Ok(parsed)
}

/// `true` for addresses a public proxy must never connect to.
pub fn is_disallowed_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.octets()[0] == 0
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || v6.is_multicast()
                || v6
                    .to_ipv4_mapped()
                    .map(|v4| is_disallowed_ip(IpAddr::V4(v4)))
                    .unwrap_or(false)
        }
    }
}

/// `true` when a `Content-Type` header value names an image.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// File extension for a stored image, from its content type.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "image/bmp" => "bmp",
        _ => "img",
    }
}

/// Content-addressed file name: `sha256(bytes)` in hex plus extension.
pub fn stored_file_name(bytes: &[u8], content_type: &str) -> String {
    let digest = Sha256::digest(bytes);
    format!("{}.{}", hex::encode(digest), extension_for(content_type))
}

/// Cache key for the stored image of a target page.
pub fn og_cache_key(target: &Url) -> String {
    let digest = Sha256::digest(target.as_str().as_bytes());
    format!("og_image_{}", hex::encode(&digest[..16]))
}
