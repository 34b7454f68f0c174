//! Server side of the Inertia protocol.
//!
//! A first visit gets an HTML shell with the page object in
//! `<div id="app" data-page="...">`. Client-side navigations send
//! `X-Inertia: true` and get the page object as JSON. A stale client (its
//! `X-Inertia-Version` differs from ours) gets `409` plus
//! `X-Inertia-Location` so it performs a full reload.

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::{flash::take_flash, state::AppState};

pub const X_INERTIA: HeaderName = HeaderName::from_static("x-inertia");
pub const X_INERTIA_VERSION: HeaderName = HeaderName::from_static("x-inertia-version");
pub const X_INERTIA_LOCATION: HeaderName = HeaderName::from_static("x-inertia-location");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub component: String,
    pub props: Value,
    pub url: String,
    pub version: String,
}

pub fn is_inertia_request(headers: &HeaderMap) -> bool {
    headers
        .get(&X_INERTIA)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Root template for full page loads.
pub fn render_shell(app_name: &str, page: &Page) -> String {
    let data = serde_json::to_string(page).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/build/app.css">
<script type="module" src="/build/app.js"></script>
</head>
<body>
<div id="app" data-page="{data}"></div>
</body>
</html>
"#,
        title = escape_html(app_name),
        data = escape_html(&data),
    )
}

/// Props every page receives. Validation errors are reduced to the first
/// message per field, the shape Inertia form helpers expect.
fn shared_props(state: &AppState, flash: &crate::flash::Flash) -> Map<String, Value> {
    let errors: Map<String, Value> = flash
        .errors
        .iter()
        .filter_map(|(field, messages)| {
            messages
                .first()
                .map(|m| (field.clone(), Value::String(m.clone())))
        })
        .collect();
    let mut props = Map::new();
    props.insert("appName".into(), json!(state.config.app_name));
    props.insert(
        "flash".into(),
        json!({ "success": flash.success, "error": flash.error }),
    );
    props.insert("errors".into(), Value::Object(errors));
    props.insert("old".into(), json!(flash.old));
    props
}

/// Render `component` for the request.
///
/// `url` is the request path and query. `page_props` must be a JSON object;
/// its keys override the shared props.
pub async fn render(
    state: &AppState,
    headers: &HeaderMap,
    url: &str,
    component: &str,
    page_props: Value,
) -> Response {
    let version = state.config.asset_version.clone();
    let inertia = is_inertia_request(headers);

    if inertia {
        let client_version = headers
            .get(&X_INERTIA_VERSION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if client_version != version {
            tracing::debug!(client_version, version = %version, "Inertia asset version mismatch");
            let mut response = StatusCode::CONFLICT.into_response();
            if let Ok(v) = HeaderValue::from_str(url) {
                response.headers_mut().insert(X_INERTIA_LOCATION, v);
            }
            return response;
        }
    }

    let (flash, clear_cookie) = take_flash(state, headers).await;
    let mut props = shared_props(state, &flash);
    if let Value::Object(own) = page_props {
        props.extend(own);
    }
    let page = Page {
        component: component.to_string(),
        props: Value::Object(props),
        url: url.to_string(),
        version,
    };

    let mut response = if inertia {
        let mut r = Json(&page).into_response();
        r.headers_mut()
            .insert(X_INERTIA, HeaderValue::from_static("true"));
        r
    } else {
        Html(render_shell(&state.config.app_name, &page)).into_response()
    };
    response
        .headers_mut()
        .insert(header::VARY, HeaderValue::from_static("X-Inertia"));
    if let Some(cookie) = clear_cookie {
        if let Ok(v) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, v);
        }
    }
    response
}
