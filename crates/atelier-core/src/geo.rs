use std::net::IpAddr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::visitor::{VisitorLocation, UNKNOWN};

/// A source of IP geolocation data.
///
/// Implementations may fail freely; the resolver in the server turns every
/// error into an `Unknown` record.
#[async_trait]
pub trait GeoLookup: Send + Sync + 'static {
    async fn lookup(&self, ip: IpAddr) -> anyhow::Result<VisitorLocation>;
}

/// Response body of the HTTP geolocation API (`ip-api.com` shape).
///
/// Providers that use `region` instead of `regionName` are accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct GeoApiResponse {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, rename = "regionName", alias = "region")]
    pub region: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

fn or_unknown(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

impl GeoApiResponse {
    pub fn into_location(self, ip: &str) -> VisitorLocation {
        VisitorLocation {
            ip: ip.to_string(),
            city: or_unknown(self.city),
            country: or_unknown(self.country),
            region: Some(or_unknown(self.region)),
            timezone: Some(or_unknown(self.timezone)),
        }
    }
}
