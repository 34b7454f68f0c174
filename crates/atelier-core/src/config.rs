use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub app_name: String,
    /// Absolute base URL used for sitemap entries and stored OG image links.
    pub app_url: String,
    pub data_dir: String,
    pub duckdb_memory_limit: String,
    pub public_dir: String,
    pub content_dir: String,
    pub asset_version: String,
    pub https: bool,
    pub cors_origins: Vec<String>,
    pub geoip_path: String,
    pub geo_api_url: String,
    pub geo_cache_ttl_secs: u64,
    /// Site owner address. `None` disables every notification mail.
    pub notify_email: Option<String>,
    pub visit_notifications: bool,
    pub visit_notify_ttl_secs: u64,
    pub og_cache_ttl_secs: u64,
    /// Allow OG targets on loopback/private networks. Off in production.
    pub og_allow_private_hosts: bool,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Log outgoing mail instead of dispatching it.
    pub noop: bool,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let trimmed = v.trim();
            trimmed.eq_ignore_ascii_case("1")
                || trimmed.eq_ignore_ascii_case("true")
                || trimmed.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(default)
}

fn env_secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: env_or("ATELIER_PORT", "3000")
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            app_name: env_or("ATELIER_APP_NAME", "Atelier"),
            app_url: env_or("ATELIER_APP_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            data_dir: env_or("ATELIER_DATA_DIR", "./data"),
            duckdb_memory_limit: env_or("ATELIER_DUCKDB_MEMORY", "1GB"),
            public_dir: env_or("ATELIER_PUBLIC_DIR", "./public"),
            content_dir: env_or("ATELIER_CONTENT_DIR", "./content"),
            asset_version: env_or("ATELIER_ASSET_VERSION", env!("CARGO_PKG_VERSION")),
            https: env_flag("ATELIER_HTTPS", false),
            cors_origins: std::env::var("ATELIER_CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            geoip_path: env_or("ATELIER_GEOIP_PATH", "./GeoLite2-City.mmdb"),
            geo_api_url: env_or("ATELIER_GEO_API_URL", "http://ip-api.com/json")
                .trim_end_matches('/')
                .to_string(),
            geo_cache_ttl_secs: env_secs("ATELIER_GEO_CACHE_TTL", 3600),
            notify_email: env_non_empty("ATELIER_NOTIFY_EMAIL"),
            visit_notifications: env_flag("ATELIER_VISIT_NOTIFICATIONS", true),
            visit_notify_ttl_secs: env_secs("ATELIER_VISIT_NOTIFY_TTL", 86_400),
            og_cache_ttl_secs: env_secs("ATELIER_OG_CACHE_TTL", 604_800),
            og_allow_private_hosts: env_flag("ATELIER_OG_ALLOW_PRIVATE", false),
            smtp: SmtpConfig {
                host: env_non_empty("ATELIER_SMTP_HOST"),
                port: std::env::var("ATELIER_SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                username: env_non_empty("ATELIER_SMTP_USERNAME"),
                password: env_non_empty("ATELIER_SMTP_PASSWORD"),
                from: env_or("ATELIER_SMTP_FROM", "atelier@localhost"),
                noop: env_flag("ATELIER_SMTP_NOOP", false),
            },
        })
    }

    pub fn geo_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.geo_cache_ttl_secs)
    }

    pub fn visit_notify_ttl(&self) -> Duration {
        Duration::from_secs(self.visit_notify_ttl_secs)
    }

    pub fn og_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.og_cache_ttl_secs)
    }

    pub fn database_path(&self) -> String {
        format!("{}/atelier.db", self.data_dir)
    }

    /// Directory that stored OG images are written to.
    pub fn og_image_dir(&self) -> PathBuf {
        PathBuf::from(&self.public_dir).join("storage").join("og-images")
    }

    pub fn jokes_path(&self) -> PathBuf {
        PathBuf::from(&self.content_dir).join("jokes.json")
    }

    pub fn portfolio_path(&self) -> PathBuf {
        PathBuf::from(&self.content_dir).join("portfolio.json")
    }
}
