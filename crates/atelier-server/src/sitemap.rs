use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;

use atelier_core::{config::Config, portfolio::load_portfolio, sitemap::render_sitemap};

/// Where `atelier sitemap` writes when no `--output` is given.
pub fn default_output(config: &Config) -> PathBuf {
    PathBuf::from(&config.public_dir).join("sitemap.xml")
}

/// Render the sitemap for today's date and write it to `output`.
pub fn generate(config: &Config, output: &Path) -> anyhow::Result<usize> {
    let projects = load_portfolio(&config.portfolio_path());
    let xml = render_sitemap(&config.app_url, Utc::now().date_naive(), &projects);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(output, &xml)
        .with_context(|| format!("failed to write sitemap to {}", output.display()))?;
    tracing::info!(
        output = %output.display(),
        projects = projects.len(),
        bytes = xml.len(),
        "Sitemap written"
    );
    Ok(xml.len())
}
