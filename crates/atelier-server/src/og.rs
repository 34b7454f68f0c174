//! `/api/fetch-og-image` backend: fetch a page, find its preview image,
//! download it and store it under the public directory.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use atelier_core::og::{
    extract_image_candidate, is_disallowed_ip, is_image_content_type, og_cache_key,
    parse_target_url, resolve_image_url, stored_file_name, OgImageError, MAX_IMAGE_BYTES,
};

use crate::state::AppState;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Only the head of a page is needed to find its meta tags.
const MAX_PAGE_BYTES: usize = 2 * 1024 * 1024;

/// `true` when every address `url`'s host resolves to is public.
///
/// Early rejection only: the OG client re-checks resolved addresses when it
/// connects.
async fn host_is_public(url: &Url) -> Result<bool, OgImageError> {
    let Some(host) = url.host_str() else {
        return Ok(false);
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(!is_disallowed_ip(ip));
    }
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(false);
    }
    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            debug!(host, error = %e, "OG target host did not resolve");
            OgImageError::FetchFailed
        })?
        .collect();
    Ok(!addrs.is_empty() && addrs.iter().all(|a| !is_disallowed_ip(a.ip())))
}

/// Cached public URL for `key`, if the stored file still exists.
async fn cached_image(state: &AppState, key: &str) -> Option<String> {
    let cached = state.cache.get(key).await?;
    let url = cached.get("url")?.as_str()?.to_string();
    let file = cached.get("file")?.as_str()?;
    let path = state.config.og_image_dir().join(file);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        Some(url)
    } else {
        state.cache.forget(key).await;
        None
    }
}

/// Read a body chunk by chunk, giving up once it exceeds `limit`.
///
/// With `truncate` the first `limit` bytes are returned instead of an error.
async fn read_limited(
    mut response: reqwest::Response,
    limit: usize,
    truncate: bool,
) -> Result<Vec<u8>, OgImageError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| {
        debug!(error = %e, "Body read failed");
        if truncate {
            OgImageError::FetchFailed
        } else {
            OgImageError::DownloadFailed
        }
    })? {
        body.extend_from_slice(&chunk);
        if body.len() > limit {
            if truncate {
                body.truncate(limit);
                break;
            }
            return Err(OgImageError::TooLarge);
        }
    }
    Ok(body)
}

async fn fetch_page(state: &AppState, target: &Url) -> Result<(Url, String), OgImageError> {
    let response = state
        .http
        .get(target.clone())
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            warn!(target = %target, error = %e, "OG target fetch failed");
            OgImageError::FetchFailed
        })?;
    if !response.status().is_success() {
        warn!(target = %target, status = %response.status(), "OG target returned an error status");
        return Err(OgImageError::FetchFailed);
    }
    let final_url = response.url().clone();
    let body = read_limited(response, MAX_PAGE_BYTES, true).await?;
    Ok((final_url, String::from_utf8_lossy(&body).into_owned()))
}

async fn download_image(state: &AppState, image: &Url) -> Result<(Vec<u8>, String), OgImageError> {
    let response = state
        .http
        .get(image.clone())
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            warn!(image = %image, error = %e, "OG image download failed");
            OgImageError::DownloadFailed
        })?;
    if !response.status().is_success() {
        warn!(image = %image, status = %response.status(), "OG image returned an error status");
        return Err(OgImageError::DownloadFailed);
    }
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !is_image_content_type(&content_type) {
        return Err(OgImageError::NotAnImage);
    }
    if response
        .content_length()
        .is_some_and(|len| len > MAX_IMAGE_BYTES as u64)
    {
        return Err(OgImageError::TooLarge);
    }
    let bytes = read_limited(response, MAX_IMAGE_BYTES, false).await?;
    Ok((bytes, content_type))
}

async fn store_image(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<(), OgImageError> {
    let path = dir.join(file_name);
    let storage_err = |e: std::io::Error| {
        warn!(path = %path.display(), error = %e, "Failed to store OG image");
        OgImageError::Storage
    };
    tokio::fs::create_dir_all(dir).await.map_err(storage_err)?;
    // Content-addressed: an existing file already holds these bytes.
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(());
    }
    tokio::fs::write(&path, bytes).await.map_err(storage_err)
}

/// Resolve the preview image of the page at `raw_url` and return the public
/// URL of the locally stored copy.
pub async fn fetch_og_image(state: &AppState, raw_url: Option<&str>) -> Result<String, OgImageError> {
    let target = parse_target_url(raw_url)?;
    let allow_private = state.config.og_allow_private_hosts;
    if !allow_private && !host_is_public(&target).await? {
        warn!(target = %target, "Refusing OG fetch for non-public host");
        return Err(OgImageError::InvalidUrl);
    }

    let key = og_cache_key(&target);
    if let Some(url) = cached_image(state, &key).await {
        debug!(target = %target, "OG image served from cache");
        return Ok(url);
    }

    let (page_url, html) = fetch_page(state, &target).await?;
    let candidate = extract_image_candidate(&html).ok_or(OgImageError::NoImage)?;
    let image_url = resolve_image_url(&page_url, &candidate).ok_or(OgImageError::NoImage)?;
    if !allow_private && !host_is_public(&image_url).await.unwrap_or(false) {
        warn!(image = %image_url, "Refusing OG image download from non-public host");
        return Err(OgImageError::DownloadFailed);
    }

    let (bytes, content_type) = download_image(state, &image_url).await?;
    let file_name = stored_file_name(&bytes, &content_type);
    store_image(&state.config.og_image_dir(), &file_name, &bytes).await?;

    let public_url = format!("{}/storage/og-images/{}", state.config.app_url, file_name);
    state
        .cache
        .put(
            &key,
            json!({ "url": public_url, "file": file_name }),
            state.config.og_cache_ttl(),
        )
        .await;
    info!(target = %target, image = %image_url, file = %file_name, bytes = bytes.len(), "OG image stored");
    Ok(public_url)
}
