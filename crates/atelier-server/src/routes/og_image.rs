use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::AppError, og, state::AppState};

#[derive(Debug, Deserialize)]
pub struct OgImageQuery {
    pub url: Option<String>,
}

/// `GET /api/fetch-og-image?url=...`: `200 {"url": "<stored image>"}`.
///
/// Failures map to 422 (bad input or not an image), 404 (page has no image),
/// 502 (upstream unreachable) or 500 (local storage).
#[tracing::instrument(skip(state))]
pub async fn fetch_og_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OgImageQuery>,
) -> Result<Json<Value>, AppError> {
    let url = og::fetch_og_image(&state, query.url.as_deref()).await?;
    Ok(Json(json!({ "url": url })))
}
