use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use atelier_core::config::{Config, SmtpConfig};
use atelier_core::mail::{Mailer, OutgoingMail};
use atelier_duckdb::DuckDbBackend;
use atelier_server::app::build_app;
use atelier_server::state::AppState;

const SUCCESS: &str = "Thank you for your message! We will get back to you soon.";

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
        notify_email: Some("owner@studio.example".to_string()),
        visit_notifications: true,
        visit_notify_ttl_secs: 86_400,
        og_cache_ttl_secs: 604_800,
        og_allow_private_hosts: false,
        smtp: SmtpConfig {
            noop: true,
            ..SmtpConfig::default()
        },
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        self.sent.lock().expect("lock").push(mail);
        Ok(())
    }
}

struct Harness {
    app: Router,
    db: DuckDbBackend,
    mailer: Arc<RecordingMailer>,
}

fn harness() -> Harness {
    let db = DuckDbBackend::open_in_memory().expect("in-memory DuckDB");
    let mailer = Arc::new(RecordingMailer::default());
    let mut state = AppState::new(db.clone(), test_config());
    state.mailer = mailer.clone();
    Harness {
        app: build_app(Arc::new(state)),
        db,
        mailer,
    }
}

fn form_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/contact")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("referer", "http://localhost:3000/contact")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn json_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/contact")
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn flash_cookie(response: &Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .expect("flash cookie set")
        .to_str()
        .expect("ascii cookie");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

/// Follow the redirect the way the Inertia client does and return the props.
async fn follow_with(app: &Router, cookie: &str) -> (Value, Option<String>) {
    let request = Request::builder()
        .method("GET")
        .uri("/contact")
        .header("x-inertia", "true")
        .header("x-inertia-version", "test")
        .header("cookie", cookie)
        .body(Body::empty())
        .expect("build request");
    let response = app.clone().oneshot(request).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get("set-cookie")
        .map(|v| v.to_str().expect("ascii").to_string());
    let page = json_body(response).await;
    (page["props"].clone(), cleared)
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("parse JSON")
}

#[tokio::test]
async fn test_missing_fields_redirect_back_with_errors_and_old_input() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(form_request("first_name=Ada&email=&message="))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/contact");
    let cookie = flash_cookie(&response);

    assert_eq!(h.db.count_contacts().await.expect("count"), 0);
    assert!(h.mailer.sent.lock().expect("lock").is_empty());

    let (props, cleared) = follow_with(&h.app, &cookie).await;
    let errors = props["errors"].as_object().expect("errors object");
    let mut fields: Vec<&str> = errors.keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, vec!["email", "last_name", "message"]);
    assert_eq!(errors["last_name"], "The last name field is required.");
    assert_eq!(props["old"]["first_name"], "Ada");
    assert!(cleared.expect("flash cleared").contains("Max-Age=0"));
}

#[tokio::test]
async fn test_valid_submission_is_stored_and_mailed() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(form_request(
            "first_name=Grace&last_name=Hopper&email=grace%40navy.example&message=Need+a+new+site",
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/contact");
    let cookie = flash_cookie(&response);

    let stored = h.db.list_contacts(10).await.expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].email, "grace@navy.example");
    assert_eq!(stored[0].message, "Need a new site");

    let sent = h.mailer.sent.lock().expect("lock").clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@studio.example");
    assert_eq!(sent[0].reply_to.as_deref(), Some("grace@navy.example"));
    assert!(sent[0].body.contains("Need a new site"));

    let (props, _) = follow_with(&h.app, &cookie).await;
    assert_eq!(props["flash"]["success"], SUCCESS);
    assert!(props["flash"]["error"].is_null());

    // Flash data is shown once.
    let (props, _) = follow_with(&h.app, &cookie).await;
    assert!(props["flash"]["success"].is_null());
}

#[tokio::test]
async fn test_json_client_gets_422_with_field_errors() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(json_request(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "not-an-email",
            "message": "x".repeat(5001),
        })))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = json_body(response).await;
    assert_eq!(json["message"], "The given data was invalid.");
    assert_eq!(
        json["errors"]["email"][0],
        "The email field must be a valid email address."
    );
    assert_eq!(
        json["errors"]["message"][0],
        "The message field must not be greater than 5000 characters."
    );
    assert!(json["errors"].get("first_name").is_none());
    assert_eq!(h.db.count_contacts().await.expect("count"), 0);
}

#[tokio::test]
async fn test_json_client_gets_201_on_success() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(json_request(json!({
            "first_name": "  Ada ",
            "last_name": "Lovelace",
            "email": "ada@engine.example",
            "message": "Hello",
        })))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], SUCCESS);

    let stored = h.db.list_contacts(10).await.expect("list");
    assert_eq!(stored[0].first_name, "Ada");
}

#[tokio::test]
async fn test_store_failure_flashes_error() {
    let h = harness();
    h.db
        .conn_for_test()
        .await
        .execute_batch("DROP INDEX idx_contacts_created; DROP TABLE contacts")
        .expect("drop contacts");

    let response = h
        .app
        .clone()
        .oneshot(form_request(
            "first_name=Grace&last_name=Hopper&email=grace%40navy.example&message=Hi",
        ))
        .await
        .expect("request");
    assert_eq!(response.status(), StatusCode::FOUND);
    let cookie = flash_cookie(&response);
    assert!(h.mailer.sent.lock().expect("lock").is_empty());

    let (props, _) = follow_with(&h.app, &cookie).await;
    assert_eq!(
        props["flash"]["error"],
        "Sorry, there was an error sending your message. Please try again later."
    );
}

#[tokio::test]
async fn test_redirect_uses_referer_path() {
    let h = harness();

    let request = Request::builder()
        .method("POST")
        .uri("/contact")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("referer", "http://localhost:3000/services?plan=pro")
        .body(Body::from("first_name="))
        .expect("build request");
    let response = h.app.clone().oneshot(request).await.expect("request");
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()["location"], "/services?plan=pro");
}
