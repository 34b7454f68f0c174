use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use atelier_core::{
    cache::CacheStore,
    config::Config,
    geo::{GeoApiResponse, GeoLookup},
    visitor::{geo_cache_key, is_local_ip, VisitorLocation, UNKNOWN},
};

const GEO_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Geolocation through a JSON HTTP API (`GET {base_url}/{ip}`).
pub struct HttpGeoLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeoLookup {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn lookup(&self, ip: IpAddr) -> anyhow::Result<VisitorLocation> {
        let url = format!("{}/{}", self.base_url, ip);
        let body: GeoApiResponse = self
            .client
            .get(&url)
            .timeout(GEO_HTTP_TIMEOUT)
            .send()
            .await
            .context("geolocation request failed")?
            .error_for_status()
            .context("geolocation API returned an error status")?
            .json()
            .await
            .context("geolocation response was not valid JSON")?;
        Ok(body.into_location(&ip.to_string()))
    }
}

/// Geolocation from a local MaxMind / DB-IP City database.
pub struct MaxMindGeoLookup {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindGeoLookup {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let reader = maxminddb::Reader::open_readfile(path)
            .with_context(|| format!("failed to open GeoIP database {}", path.display()))?;
        Ok(Self { reader })
    }
}

#[async_trait]
impl GeoLookup for MaxMindGeoLookup {
    async fn lookup(&self, ip: IpAddr) -> anyhow::Result<VisitorLocation> {
        let result = self.reader.lookup(ip)?;
        let Some(record) = result.decode::<maxminddb::geoip2::City>()? else {
            return Ok(VisitorLocation::unknown(&ip.to_string()));
        };
        let name = |value: Option<&str>| value.unwrap_or(UNKNOWN).to_string();
        Ok(VisitorLocation {
            ip: ip.to_string(),
            city: name(record.city.names.english),
            country: name(record.country.names.english),
            region: Some(name(
                record.subdivisions.first().and_then(|s| s.names.english),
            )),
            timezone: Some(name(record.location.time_zone)),
        })
    }
}

/// Pick the lookup for this deployment: the local database when the file is
/// present, the HTTP API otherwise.
pub fn lookup_from_config(config: &Config, client: reqwest::Client) -> Arc<dyn GeoLookup> {
    let path = Path::new(&config.geoip_path);
    if path.exists() {
        match MaxMindGeoLookup::open(path) {
            Ok(lookup) => {
                tracing::info!(geoip_path = %config.geoip_path, "Using local GeoIP database");
                return Arc::new(lookup);
            }
            Err(e) => {
                tracing::warn!(error = %e, "GeoIP database unreadable; falling back to HTTP API");
            }
        }
    }
    Arc::new(HttpGeoLookup::new(client, config.geo_api_url.clone()))
}

/// Resolve `ip` to a location. Never fails.
///
/// Loopback addresses get a fixed local record without any lookup. Anything
/// else is served from the cache when possible; otherwise the lookup runs and
/// its result (including the `Unknown` fallback on failure) is cached for
/// `ttl`.
pub async fn resolve_location(
    cache: &dyn CacheStore,
    lookup: &dyn GeoLookup,
    ip: &str,
    ttl: Duration,
) -> VisitorLocation {
    if is_local_ip(ip) {
        return VisitorLocation::local(ip);
    }
    let Ok(addr) = ip.trim().parse::<IpAddr>() else {
        tracing::warn!(ip, "Cannot geolocate unparseable client address");
        return VisitorLocation::unknown(ip);
    };

    let key = geo_cache_key(ip);
    if let Some(cached) = cache.get(&key).await {
        match serde_json::from_value::<VisitorLocation>(cached) {
            Ok(location) => return location,
            Err(e) => tracing::warn!(ip, error = %e, "Discarding malformed cached location"),
        }
    }

    let location = match lookup.lookup(addr).await {
        Ok(location) => location,
        Err(e) => {
            tracing::warn!(ip, error = %e, "Geolocation lookup failed");
            VisitorLocation::unknown(ip)
        }
    };

    match serde_json::to_value(&location) {
        Ok(value) => cache.put(&key, value, ttl).await,
        Err(e) => tracing::warn!(ip, error = %e, "Failed to serialise location for cache"),
    }
    location
}
