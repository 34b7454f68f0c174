use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use atelier_core::{config::Config, joke::parse_seed_file, portfolio::load_portfolio};
use atelier_duckdb::DuckDbBackend;
use atelier_server::state::AppState;

/// `atelier health`: liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$ATELIER_PORT/health` and exits 0 on HTTP 200,
/// 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("ATELIER_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{port}/health");
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

/// `atelier sitemap [--output <path>]`.
fn run_sitemap(cfg: &Config, args: &[String]) -> Result<()> {
    let output = match args.iter().position(|a| a == "--output" || a == "-o") {
        Some(i) => PathBuf::from(
            args.get(i + 1)
                .ok_or_else(|| anyhow::anyhow!("--output requires a path"))?,
        ),
        None => atelier_server::sitemap::default_output(cfg),
    };
    atelier_server::sitemap::generate(cfg, &output)?;
    println!("Sitemap written to {}", output.display());
    Ok(())
}

/// Import `jokes.json` when the table is empty. Missing file is fine.
async fn seed_jokes(db: &DuckDbBackend, cfg: &Config) {
    let path = cfg.jokes_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => {
            info!(path = %path.display(), "No jokes seed file; skipping import");
            return;
        }
    };
    let jokes = match parse_seed_file(&contents) {
        Ok(j) => j,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Jokes seed file is invalid");
            return;
        }
    };
    match db.seed_jokes_if_empty(&jokes).await {
        Ok(0) => info!("Jokes table already populated"),
        Ok(n) => info!(count = n, "Seeded jokes table"),
        Err(e) => tracing::warn!(error = %e, "Failed to seed jokes"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handled before logging setup so the probe stays quiet and fast.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("atelier=info".parse()?),
        )
        .json()
        .init();

    let cfg = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    if args.get(1).map(|s| s.as_str()) == Some("sitemap") {
        return run_sitemap(&cfg, &args[2..]);
    }

    std::fs::create_dir_all(&cfg.data_dir)?;
    std::fs::create_dir_all(cfg.og_image_dir())?;

    let db = DuckDbBackend::open(&cfg.database_path(), &cfg.duckdb_memory_limit)?;
    seed_jokes(&db, &cfg).await;

    if !std::path::Path::new(&cfg.geoip_path).exists() {
        info!(
            geoip_path = %cfg.geoip_path,
            geo_api_url = %cfg.geo_api_url,
            "GeoIP database not found; using the HTTP geolocation API"
        );
    }
    if cfg.notify_email.is_none() {
        info!("ATELIER_NOTIFY_EMAIL not set; owner notifications disabled");
    }

    let projects = load_portfolio(&cfg.portfolio_path());
    info!(count = projects.len(), "Portfolio loaded");

    let state = Arc::new(AppState::new(db, cfg.clone()).with_portfolio(projects));
    let app = atelier_server::app::build_app(state);

    let addr = format!("0.0.0.0:{}", cfg.port);
    info!(port = cfg.port, app_url = %cfg.app_url, "Atelier listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    info!("Atelier shut down");
    Ok(())
}
