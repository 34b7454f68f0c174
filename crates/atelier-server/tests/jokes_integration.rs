use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use atelier_core::config::{Config, SmtpConfig};
use atelier_core::joke::NewJoke;
use atelier_duckdb::DuckDbBackend;
use atelier_server::app::build_app;
use atelier_server::state::AppState;

fn test_config() -> Config {
    Config {
        port: 0,
        app_name: "Atelier".to_string(),
        app_url: "http://localhost:3000".to_string(),
        data_dir: "/tmp/atelier-test".to_string(),
        duckdb_memory_limit: "256MB".to_string(),
        public_dir: "/tmp/atelier-test/public".to_string(),
        content_dir: "/tmp/atelier-test/content".to_string(),
        asset_version: "test".to_string(),
        https: false,
        cors_origins: vec![],
        geoip_path: "/nonexistent/GeoLite2-City.mmdb".to_string(),
        geo_api_url: "http://127.0.0.1:9".to_string(),
        geo_cache_ttl_secs: 3600,
        notify_email: None,
        visit_notifications: false,
        visit_notify_ttl_secs: 86_400,
        og_cache_ttl_secs: 604_800,
        og_allow_private_hosts: false,
        smtp: SmtpConfig {
            noop: true,
            ..SmtpConfig::default()
        },
    }
}

fn joke_request() -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/api/random-joke")
        .body(Body::empty())
        .expect("build request")
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

#[tokio::test]
async fn test_empty_table_returns_503() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let app = build_app(Arc::new(AppState::new(db, test_config())));

    let response = app.oneshot(joke_request()).await.expect("request");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "No jokes available");
}

#[tokio::test]
async fn test_returns_a_stored_joke() {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    db.insert_jokes(&[
        NewJoke {
            setup: "Why do programmers prefer dark mode?".to_string(),
            punchline: "Because light attracts bugs.".to_string(),
        },
        NewJoke {
            setup: "How many programmers does it take to change a light bulb?".to_string(),
            punchline: "None, that's a hardware problem.".to_string(),
        },
    ])
    .await
    .expect("insert jokes");
    let app = build_app(Arc::new(AppState::new(db, test_config())));

    for _ in 0..5 {
        let response = app.clone().oneshot(joke_request()).await.expect("request");
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert!(json["id"].as_i64().is_some());
        let setup = json["setup"].as_str().expect("setup");
        let punchline = json["punchline"].as_str().expect("punchline");
        match setup {
            "Why do programmers prefer dark mode?" => {
                assert_eq!(punchline, "Because light attracts bugs.")
            }
            "How many programmers does it take to change a light bulb?" => {
                assert_eq!(punchline, "None, that's a hardware problem.")
            }
            other => panic!("unexpected joke {other}"),
        }
    }
}
