use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use atelier_core::visitor::VisitPayload;

use crate::{
    geo::resolve_location,
    notify::{notify_visit, Visit},
    routes::ClientIp,
    state::AppState,
};

/// `POST /track-visit`: geolocate the caller and tell the owner about new
/// visitors.
///
/// The body `{page?, referrer?}` is optional; anything that does not parse is
/// treated as empty. Geolocation and mail failures never fail the request.
///
/// ## Response
/// `200` with `{ "success": true, "message": "...", "data": {ip, city, country, region, timezone} }`.
#[tracing::instrument(skip(state, headers, body))]
pub async fn track_visit(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let payload: VisitPayload = if body.is_empty() {
        VisitPayload::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Ignoring malformed track-visit body");
            VisitPayload::default()
        })
    };

    let location = resolve_location(
        state.cache.as_ref(),
        state.geo.as_ref(),
        &ip,
        state.config.geo_cache_ttl(),
    )
    .await;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let visit = Visit {
        location,
        user_agent,
        page: payload.page,
        referrer: payload.referrer,
        at: Utc::now(),
    };
    let outcome = notify_visit(&state, &visit).await;
    tracing::info!(
        ip = %visit.location.ip,
        city = %visit.location.city,
        country = %visit.location.country,
        notification = ?outcome,
        "Visit tracked"
    );

    Json(json!({
        "success": true,
        "message": "Visit tracked successfully",
        "data": {
            "ip": visit.location.ip,
            "city": visit.location.city,
            "country": visit.location.country,
            "region": visit.location.region,
            "timezone": visit.location.timezone,
        },
    }))
}
