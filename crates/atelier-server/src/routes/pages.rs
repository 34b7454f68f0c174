use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    response::Response,
};
use serde_json::json;

use crate::{inertia, state::AppState};

fn page_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

pub async fn home(State(state): State<Arc<AppState>>, headers: HeaderMap, uri: Uri) -> Response {
    inertia::render(&state, &headers, &page_url(&uri), "Home", json!({})).await
}

pub async fn about(State(state): State<Arc<AppState>>, headers: HeaderMap, uri: Uri) -> Response {
    inertia::render(&state, &headers, &page_url(&uri), "About", json!({})).await
}

pub async fn services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    inertia::render(&state, &headers, &page_url(&uri), "Services", json!({})).await
}

/// Portfolio page: the projects loaded from the content directory at startup.
pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let props = json!({ "projects": state.portfolio.as_slice() });
    inertia::render(&state, &headers, &page_url(&uri), "Portfolio", props).await
}

/// Contact page. `contactEmail` is the owner address, `null` when unset.
pub async fn contact(State(state): State<Arc<AppState>>, headers: HeaderMap, uri: Uri) -> Response {
    let props = json!({ "contactEmail": state.config.notify_email });
    inertia::render(&state, &headers, &page_url(&uri), "Contact", props).await
}
