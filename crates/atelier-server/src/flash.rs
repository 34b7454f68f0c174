//! One-shot flash data carried across a redirect.
//!
//! The payload lives in the cache store under `flash_{id}`; the browser only
//! holds the id in the `atelier_flash` cookie. Old input for a 5000 character
//! message would not fit in a cookie.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use atelier_core::contact::ValidationErrors;

use crate::state::AppState;

pub const FLASH_COOKIE: &str = "atelier_flash";

const FLASH_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: ValidationErrors,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub old: BTreeMap<String, String>,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Validation failure: the messages plus the submitted values.
    pub fn invalid(errors: ValidationErrors, old: BTreeMap<String, String>) -> Self {
        Self {
            errors,
            old,
            ..Self::default()
        }
    }
}

fn cache_key(id: &str) -> String {
    format!("flash_{id}")
}

fn build_flash_cookie(id: &str, https: bool) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!(
        "{FLASH_COOKIE}={id}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{secure}",
        FLASH_TTL.as_secs()
    )
}

pub fn clear_flash_cookie(https: bool) -> String {
    let secure = if https { "; Secure" } else { "" };
    format!("{FLASH_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure}")
}

/// The flash id from the request's `Cookie` header, if any.
pub fn flash_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix(&format!("{FLASH_COOKIE}=")).map(str::to_string))
        .filter(|id| !id.is_empty())
}

/// Store `flash` and return the `Set-Cookie` value pointing at it.
pub async fn put_flash(state: &AppState, flash: &Flash) -> Option<String> {
    let value = match serde_json::to_value(flash) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialise flash data");
            return None;
        }
    };
    let id = uuid::Uuid::new_v4().simple().to_string();
    state.cache.put(&cache_key(&id), value, FLASH_TTL).await;
    Some(build_flash_cookie(&id, state.config.https))
}

/// Read and remove the flash for this request.
///
/// Returns the flash (empty when none) and, when the request carried a flash
/// cookie, the `Set-Cookie` value that clears it.
pub async fn take_flash(state: &AppState, headers: &HeaderMap) -> (Flash, Option<String>) {
    let Some(id) = flash_id(headers) else {
        return (Flash::default(), None);
    };
    let key = cache_key(&id);
    let flash = state
        .cache
        .get(&key)
        .await
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    state.cache.forget(&key).await;
    (flash, Some(clear_flash_cookie(state.config.https)))
}

/// `true` for a path a browser cannot read as another host: a leading `/`,
/// no `//` prefix and no backslashes (browsers treat `\` as `/`).
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// Same-site path to send the browser back to: the `Referer` path when there
/// is one, `fallback` otherwise.
pub fn back_path(headers: &HeaderMap, fallback: &str) -> String {
    let Some(referer) = headers.get(header::REFERER).and_then(|v| v.to_str().ok()) else {
        return fallback.to_string();
    };
    let path = if referer.starts_with('/') {
        referer.to_string()
    } else {
        match url::Url::parse(referer) {
            Ok(u) => match u.query() {
                Some(q) => format!("{}?{q}", u.path()),
                None => u.path().to_string(),
            },
            Err(_) => return fallback.to_string(),
        }
    };
    if is_local_path(&path) {
        path
    } else {
        fallback.to_string()
    }
}

/// `302 Found` back to the previous page with `flash` attached.
pub async fn redirect_back(
    state: &AppState,
    headers: &HeaderMap,
    fallback: &str,
    flash: Flash,
) -> Response {
    let location = back_path(headers, fallback);
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(v) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, v);
    }
    if let Some(cookie) = put_flash(state, &flash).await {
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, v);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).expect("header"));
        }
        map
    }

    #[test]
    fn reads_flash_id_among_other_cookies() {
        let h = headers(&[(header::COOKIE, "theme=dark; atelier_flash=abc123; other=1")]);
        assert_eq!(flash_id(&h).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_flash_cookie_is_ignored() {
        let h = headers(&[(header::COOKIE, "atelier_flash=")]);
        assert!(flash_id(&h).is_none());
    }

    #[test]
    fn back_path_keeps_only_path_and_query() {
        let h = headers(&[(header::REFERER, "https://evil.example/contact?x=1")]);
        assert_eq!(back_path(&h, "/contact"), "/contact?x=1");
        let h = headers(&[(header::REFERER, "/about")]);
        assert_eq!(back_path(&h, "/contact"), "/about");
        let h = headers(&[(header::REFERER, "//evil.example/x")]);
        assert_eq!(back_path(&h, "/contact"), "/contact");
        assert_eq!(back_path(&HeaderMap::new(), "/contact"), "/contact");
    }

    #[test]
    fn back_path_rejects_paths_browsers_read_as_hosts() {
        for referer in [
            "/\\evil.example",
            "/\\/evil.example/x",
            "https://site.example//evil.example/x",
            "https://site.example/\\evil.example",
        ] {
            let h = headers(&[(header::REFERER, referer)]);
            assert_eq!(back_path(&h, "/contact"), "/contact", "referer {referer}");
        }
    }

    #[test]
    fn cookies_carry_secure_flag_when_https() {
        assert!(build_flash_cookie("id", true).ends_with("; Secure"));
        assert!(!build_flash_cookie("id", false).contains("Secure"));
        assert!(clear_flash_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn empty_fields_are_not_serialised() {
        let value = serde_json::to_value(Flash::success("ok")).expect("json");
        assert_eq!(value, serde_json::json!({ "success": "ok" }));
    }
}
