use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::storage::CatalogStore;

/// Maximum length of a generated file name
const MAX_FILENAME_LEN: usize = 100;

/// Outcome counters for one archive pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveReport {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Downloads every persisted product's page HTML into an output directory.
///
/// A plain fetch-and-write loop with no coordination: pages already on disk
/// are skipped, per-product failures are logged and the loop moves on.
pub struct HtmlArchiver {
    store: Arc<dyn CatalogStore>,
    output_dir: PathBuf,
    client: reqwest::Client,
}

impl HtmlArchiver {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        output_dir: PathBuf,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build the archive HTTP client")?;

        Ok(Self {
            store,
            output_dir,
            client,
        })
    }

    pub async fn archive_all(&self) -> Result<ArchiveReport> {
        fs::create_dir_all(&self.output_dir).await.context(format!(
            "failed to create output directory: {}",
            self.output_dir.display()
        ))?;

        let products = self
            .store
            .all_products()
            .await
            .context("failed to list products for archival")?;
        info!("found {} products to archive", products.len());

        let mut report = ArchiveReport::default();
        for product in products {
            let filename = format!("{}.html", sanitize_filename(page_slug(&product.url)));
            let path = self.output_dir.join(filename);

            if fs::try_exists(&path).await.unwrap_or(false) {
                debug!("page already archived for product {}, skipping", product.id);
                report.skipped += 1;
                continue;
            }

            debug!("fetching '{}' from {}", product.name, product.url);
            match self.fetch_page(&product.url).await {
                Ok(body) => match self.save_page(&path, &body).await {
                    Ok(()) => {
                        debug!("archived product {} to {}", product.id, path.display());
                        report.saved += 1;
                    }
                    Err(e) => {
                        warn!("failed to write page for product {}: {}", product.id, e);
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    warn!("failed to fetch page for product {}: {}", product.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "archive pass finished: {} saved, {} skipped, {} failed",
            report.saved, report.skipped, report.failed
        );

        Ok(report)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await
            .context(format!("failed to fetch URL: {}", url))?
            .error_for_status()
            .context("page request was rejected")?
            .text()
            .await
            .context("failed to read the page body")?;

        Ok(body)
    }

    async fn save_page(&self, path: &Path, body: &str) -> Result<()> {
        fs::write(path, body)
            .await
            .context(format!("failed to save file: {}", path.display()))?;

        Ok(())
    }
}

/// Trailing path segment of a product URL, used as its stable page id.
fn page_slug(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
}

/// Replace characters that are invalid in file names and bound the length.
fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    sanitized.chars().take(MAX_FILENAME_LEN).collect()
}
