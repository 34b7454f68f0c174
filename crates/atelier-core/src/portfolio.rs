use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioProject {
    pub slug: String,
    pub title: String,
    /// Live site of the client project. Its OG image is fetched on demand.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn parse_portfolio(contents: &str) -> Result<Vec<PortfolioProject>, CoreError> {
    Ok(serde_json::from_str(contents)?)
}

/// Load the portfolio file. A missing or malformed file yields an empty list.
pub fn load_portfolio(path: &Path) -> Vec<PortfolioProject> {
    if !path.exists() {
        warn!(path = %path.display(), "Portfolio file not found; portfolio is empty");
        return Vec::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(CoreError::from)
        .and_then(|contents| parse_portfolio(&contents));
    match parsed {
        Ok(projects) => projects,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load portfolio file");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_default() {
        let projects = parse_portfolio(
            r#"[{"slug":"acme","title":"Acme","url":"https://acme.test"}]"#,
        )
        .unwrap();
        assert_eq!(projects.len(), 1);
        assert!(projects[0].tags.is_empty());
        assert!(projects[0].image.is_none());
    }

    #[test]
    fn missing_file_is_empty() {
        assert!(load_portfolio(Path::new("/nonexistent/portfolio.json")).is_empty());
    }
}
