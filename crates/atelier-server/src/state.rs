use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

use atelier_core::{
    cache::CacheStore, config::Config, geo::GeoLookup, mail::Mailer,
    og::is_disallowed_ip, portfolio::PortfolioProject,
};
use atelier_duckdb::DuckDbBackend;

use crate::{cache::MemoryCache, geo::lookup_from_config, mail::mailer_from_config};

const MAX_REDIRECTS: usize = 5;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
///
/// Service fields are trait objects so tests can swap in doubles before the
/// state is wrapped in `Arc`.
pub struct AppState {
    /// The DuckDB backend. Internally an `Arc<Mutex<Connection>>`.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// Geolocation results, visitor notification throttle keys, OG image
    /// links and flash messages.
    pub cache: Arc<dyn CacheStore>,

    pub mailer: Arc<dyn Mailer>,

    pub geo: Arc<dyn GeoLookup>,

    /// Outbound HTTP client for OG page and image fetches. See
    /// [`build_og_client`].
    pub http: reqwest::Client,

    /// Portfolio projects loaded from the content directory at startup.
    pub portfolio: Arc<Vec<PortfolioProject>>,
}

/// Resolver for the OG client that drops private, loopback and link-local
/// addresses, so a public-looking name cannot lead the connection inward.
///
/// The connection uses exactly the addresses checked here, which also covers
/// names that resolve differently between the pre-flight check and the fetch.
/// Literal IP hosts never reach a resolver; the redirect policy and
/// `og::host_is_public` handle those.
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let host = name.as_str().to_string();
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await?
                .filter(|a| !is_disallowed_ip(a.ip()))
                .collect();
            if addrs.is_empty() {
                tracing::warn!(host = %host, "Refusing connection to non-public address");
                return Err(format!("{host} does not resolve to a public address").into());
            }
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

fn user_agent(config: &Config) -> String {
    format!(
        "Mozilla/5.0 (compatible; AtelierBot/{}; +{})",
        env!("CARGO_PKG_VERSION"),
        config.app_url
    )
}

/// Client for the HTTP geolocation API, an operator-configured endpoint.
pub fn build_http_client(config: &Config) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent(config))
        .connect_timeout(Duration::from_secs(3))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Client for OG page and image fetches, where the target comes from the
/// caller.
///
/// At most five redirects are followed. Unless private targets
/// are allowed, redirects to literal private addresses are not followed and
/// host names are resolved through [`PublicOnlyResolver`].
pub fn build_og_client(config: &Config) -> reqwest::Client {
    let allow_private = config.og_allow_private_hosts;
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        // `previous()` includes the original request URL.
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let private = match attempt.url().host() {
            Some(url::Host::Ipv4(v4)) => is_disallowed_ip(v4.into()),
            Some(url::Host::Ipv6(v6)) => is_disallowed_ip(v6.into()),
            Some(url::Host::Domain(d)) => d.eq_ignore_ascii_case("localhost"),
            None => true,
        };
        if private && !allow_private {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });

    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent(config))
        .connect_timeout(Duration::from_secs(3))
        .redirect(policy);
    if !allow_private {
        builder = builder.dns_resolver(Arc::new(PublicOnlyResolver));
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to default HTTP client");
        reqwest::Client::new()
    })
}

impl AppState {
    /// Construct a new `AppState` with the services selected by `config`.
    pub fn new(db: DuckDbBackend, config: Config) -> Self {
        let http = build_og_client(&config);
        let geo = lookup_from_config(&config, build_http_client(&config));
        let mailer = mailer_from_config(&config.smtp);
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            cache: Arc::new(MemoryCache::new()),
            mailer,
            geo,
            http,
            portfolio: Arc::new(Vec::new()),
        }
    }

    pub fn with_portfolio(mut self, projects: Vec<PortfolioProject>) -> Self {
        self.portfolio = Arc::new(projects);
        self
    }
}
