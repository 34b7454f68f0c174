use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const UNKNOWN: &str = "Unknown";

/// Where a visitor appears to be, as reported by the geolocation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorLocation {
    pub ip: String,
    pub city: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl VisitorLocation {
    /// Fixed record for requests coming from the developer's own machine.
    pub fn local(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            city: "Localhost".to_string(),
            country: "Local Development".to_string(),
            region: None,
            timezone: None,
        }
    }

    /// Fallback record when the lookup could not be performed.
    pub fn unknown(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            city: UNKNOWN.to_string(),
            country: UNKNOWN.to_string(),
            region: None,
            timezone: None,
        }
    }
}

/// Optional JSON body of `POST /track-visit`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitPayload {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
}

/// Returns `true` for loopback addresses and the literal `localhost`.
pub fn is_local_ip(ip: &str) -> bool {
    let trimmed = ip.trim();
    if trimmed.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match trimmed.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.is_loopback(),
        Ok(IpAddr::V6(v6)) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
        Err(_) => false,
    }
}

/// Short digest identifying a (ip, user-agent) pair.
///
/// `sha256(ip + "|" + user_agent)[0..8]` encoded as 16 hex chars.
pub fn visitor_fingerprint(ip: &str, user_agent: &str) -> String {
    let input = format!("{ip}|{user_agent}");
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

pub fn geo_cache_key(ip: &str) -> String {
    format!("geo_location_{ip}")
}

pub fn notification_cache_key(fingerprint: &str) -> String {
    format!("visit_notified_{fingerprint}")
}
