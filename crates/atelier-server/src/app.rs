use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// CORS for the JSON endpoints. With no configured origins any origin is
/// allowed, which `/track-visit` needs when the script runs on other hosts.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// `OPTIONS` requests are answered by the CORS layer with `200`; clients of
/// `/track-visit` expect `204 No Content`.
async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `preflight_no_content`: `OPTIONS` answers become `204`.
/// 2. `CorsLayer`: answers preflights and tags JSON responses.
/// 3. `TraceLayer`: structured request/response logging via `tracing`.
///
/// Unmatched paths fall through to the static files in `public_dir`, which
/// includes stored OG images under `/storage/og-images/`.
pub fn build_app(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.public_dir);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(routes::pages::home))
        .route("/about", get(routes::pages::about))
        .route("/services", get(routes::pages::services))
        .route("/portfolio", get(routes::pages::portfolio))
        .route(
            "/contact",
            get(routes::pages::contact).post(routes::contact::submit_contact),
        )
        .route("/track-visit", post(routes::track_visit::track_visit))
        .route("/api/random-joke", get(routes::jokes::random_joke))
        .route("/api/fetch-og-image", get(routes::og_image::fetch_og_image))
        .route("/health", get(routes::health::health))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(preflight_no_content))
        .with_state(state)
}
