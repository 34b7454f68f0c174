use chrono::NaiveDate;

use crate::portfolio::PortfolioProject;

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// Path relative to the site root, e.g. `/about`.
    pub path: &'static str,
    pub changefreq: &'static str,
    pub priority: f32,
}

/// The marketing pages, in navigation order.
pub const PAGES: [SitemapEntry; 5] = [
    SitemapEntry { path: "/", changefreq: "weekly", priority: 1.0 },
    SitemapEntry { path: "/about", changefreq: "monthly", priority: 0.8 },
    SitemapEntry { path: "/services", changefreq: "monthly", priority: 0.8 },
    SitemapEntry { path: "/portfolio", changefreq: "weekly", priority: 0.9 },
    SitemapEntry { path: "/contact", changefreq: "yearly", priority: 0.6 },
];

pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn absolute(app_url: &str, path: &str) -> String {
    let base = app_url.trim_end_matches('/');
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path == "/" {
        format!("{base}/")
    } else {
        format!("{base}/{}", path.trim_start_matches('/'))
    }
}

/// Render a `urlset` sitemap for the marketing pages.
///
/// The portfolio page lists the preview image of every project that has one,
/// using the Google image sitemap extension.
pub fn render_sitemap(app_url: &str, lastmod: NaiveDate, projects: &[PortfolioProject]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
         xmlns:image=\"http://www.google.com/schemas/sitemap-image/1.1\">\n",
    );
    let lastmod = lastmod.format("%Y-%m-%d").to_string();

    for page in PAGES.iter() {
        xml.push_str("  <url>\n");
        xml.push_str(&format!(
            "    <loc>{}</loc>\n",
            escape_xml(&absolute(app_url, page.path))
        ));
        xml.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
        xml.push_str(&format!("    <changefreq>{}</changefreq>\n", page.changefreq));
        xml.push_str(&format!("    <priority>{:.1}</priority>\n", page.priority));
        if page.path == "/portfolio" {
            for project in projects {
                let Some(image) = project.image.as_deref().filter(|i| !i.trim().is_empty()) else {
                    continue;
                };
                xml.push_str("    <image:image>\n");
                xml.push_str(&format!(
                    "      <image:loc>{}</image:loc>\n",
                    escape_xml(&absolute(app_url, image))
                ));
                xml.push_str(&format!(
                    "      <image:title>{}</image:title>\n",
                    escape_xml(&project.title)
                ));
                xml.push_str("    </image:image>\n");
            }
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}
