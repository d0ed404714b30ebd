use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One brand discovered in the sitemap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrandEntry {
    pub name: String,
    pub url: String,
}

/// One-shot, stateless discovery of the brand backlog from the site's
/// sitemap XML. Runs entirely outside the concurrent crawl core.
pub struct SitemapDiscovery {
    client: reqwest::Client,
    sitemap_url: String,
}

impl SitemapDiscovery {
    pub fn new(sitemap_url: String, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build the sitemap HTTP client")?;

        Ok(Self {
            client,
            sitemap_url,
        })
    }

    /// Fetch the sitemap and return every brand entry it lists.
    pub async fn fetch_brands(&self) -> Result<Vec<BrandEntry>> {
        debug!("fetching brand sitemap: {}", self.sitemap_url);

        let body = self
            .client
            .get(&self.sitemap_url)
            .send()
            .await
            .context(format!("failed to fetch sitemap: {}", self.sitemap_url))?
            .error_for_status()
            .context("sitemap request was rejected")?
            .text()
            .await
            .context("failed to read the sitemap body")?;

        parse_brand_sitemap(&body)
    }
}

/// Pull `(brand name, url)` pairs out of sitemap XML.
///
/// Entries without a `<loc>` or without a `/brand/<name>/` path segment are
/// logged and skipped.
pub fn parse_brand_sitemap(xml: &str) -> Result<Vec<BrandEntry>> {
    let document = Html::parse_document(xml);
    let url_selector =
        Selector::parse("url").map_err(|_| anyhow!("invalid selector: url"))?;
    let loc_selector =
        Selector::parse("loc").map_err(|_| anyhow!("invalid selector: loc"))?;
    let name_pattern =
        Regex::new(r"/brand/([^/]+)").context("invalid brand path pattern")?;

    let mut entries = Vec::new();
    for url_element in document.select(&url_selector) {
        let Some(loc) = url_element.select(&loc_selector).next() else {
            warn!("skipping sitemap entry without a <loc>");
            continue;
        };

        let url = loc.text().collect::<String>().trim().to_string();
        if url.is_empty() {
            warn!("skipping sitemap entry with an empty <loc>");
            continue;
        }

        let Some(name) = brand_name_from_url(&name_pattern, &url) else {
            warn!("skipping sitemap URL without a brand segment: {}", url);
            continue;
        };

        entries.push(BrandEntry { name, url });
    }

    debug!("parsed {} brand entries from the sitemap", entries.len());

    Ok(entries)
}

/// Derive a display name from the `/brand/<name>/` path segment.
fn brand_name_from_url(pattern: &Regex, url: &str) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|segment| segment.as_str().replace('_', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://shop.example.com/brand/Borges/f2e7c6e7-1636-4251-ad8b-3deb50875378</loc>
    <lastmod>2025-06-01</lastmod>
  </url>
  <url>
    <loc>https://shop.example.com/brand/Blue_Tokai/baa84966-485c-4a2e-b783-d41aa9676c70</loc>
  </url>
  <url>
    <loc>https://shop.example.com/about</loc>
  </url>
</urlset>"#;

    #[test]
    fn parses_brand_entries_and_skips_the_rest() {
        let entries = parse_brand_sitemap(FIXTURE).expect("fixture should parse");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Borges");
        assert_eq!(entries[1].name, "Blue Tokai");
        assert!(entries[1].url.contains("/brand/Blue_Tokai/"));
    }

    #[test]
    fn empty_document_yields_no_entries() {
        let entries = parse_brand_sitemap("<urlset></urlset>").expect("should parse");
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn fetches_the_sitemap_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap/brands.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
            .mount(&server)
            .await;

        let discovery = SitemapDiscovery::new(
            format!("{}/sitemap/brands.xml", server.uri()),
            "catalog-crawler-test/1.0",
        )
        .expect("client should build");

        let entries = discovery.fetch_brands().await.expect("fetch should succeed");
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn server_errors_surface_as_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let discovery = SitemapDiscovery::new(
            format!("{}/sitemap/brands.xml", server.uri()),
            "catalog-crawler-test/1.0",
        )
        .expect("client should build");

        assert!(discovery.fetch_brands().await.is_err());
    }
}
