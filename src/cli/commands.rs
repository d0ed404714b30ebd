use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::archive::HtmlArchiver;
use crate::browser::WebDriverProvider;
use crate::cli::config::AppConfig;
use crate::crawler::{CrawlOrchestrator, CrawlSettings};
use crate::sitemap::SitemapDiscovery;
use crate::storage::{CatalogStore, PostgresCatalogStore};

fn load_config(profile: &Option<String>) -> Result<AppConfig> {
    match profile {
        Some(name) => {
            AppConfig::load_profile(name).context(format!("failed to load profile: {}", name))
        }
        None => AppConfig::load_default(),
    }
}

async fn connect_store(config: &AppConfig) -> Result<Arc<PostgresCatalogStore>> {
    let store = PostgresCatalogStore::connect(&config.store)
        .await
        .context("failed to connect to the catalog store")?;
    Ok(Arc::new(store))
}

/// Crawl products for every brand still pending in the store
pub async fn crawl(profile: Option<String>, workers: Option<usize>) -> Result<()> {
    let mut config = load_config(&profile)?;

    // Command line overrides
    if let Some(count) = workers {
        config.crawler.worker_count = count;
    }

    let store = connect_store(&config).await?;
    let provider = Arc::new(WebDriverProvider::new(
        config.browser.clone(),
        config.site.selectors.clone(),
    ));
    let settings = CrawlSettings::from_config(&config)?;

    let orchestrator = CrawlOrchestrator::new(settings, store, provider);
    let summary = orchestrator.run().await?;

    println!(
        "Brands completed: {}/{}",
        summary.completed, summary.total
    );
    println!("Brands failed: {}", summary.failed);
    println!("Products persisted: {}", summary.products);

    if summary.failed > 0 {
        warn!(
            "{} brands stay pending and will be picked up by the next run",
            summary.failed
        );
    }

    Ok(())
}

/// Discover the brand backlog from the site's sitemap
pub async fn discover(profile: Option<String>, sitemap_url: Option<String>) -> Result<()> {
    let config = load_config(&profile)?;
    let url = sitemap_url.unwrap_or_else(|| config.site.sitemap_url.clone());

    let discovery = SitemapDiscovery::new(url, &config.browser.user_agent)?;
    let entries = discovery.fetch_brands().await?;

    if entries.is_empty() {
        warn!("the sitemap listed no brands");
        return Ok(());
    }

    let store = connect_store(&config).await?;
    let inserted = store.insert_brands(&entries).await?;

    println!(
        "Discovered {} brands, {} new",
        entries.len(),
        inserted
    );

    Ok(())
}

/// Download each persisted product's page HTML
pub async fn archive(profile: Option<String>, output: PathBuf) -> Result<()> {
    let config = load_config(&profile)?;
    let store = connect_store(&config).await?;

    let archiver = HtmlArchiver::new(store, output, &config.browser.user_agent)?;
    let report = archiver.archive_all().await?;

    println!(
        "Pages saved: {} ({} already on disk, {} failed)",
        report.saved, report.skipped, report.failed
    );

    Ok(())
}

/// Show backlog and product counts
pub async fn status(profile: Option<String>) -> Result<()> {
    let config = load_config(&profile)?;
    let store = connect_store(&config).await?;

    let counts = store.counts().await?;

    println!("Brands: {}", counts.brands_total);
    println!(
        "Completed: {}/{}",
        counts.brands_completed, counts.brands_total
    );
    println!(
        "Pending: {}",
        counts.brands_total - counts.brands_completed
    );
    println!("Products: {}", counts.products);

    Ok(())
}

/// List all available configuration profiles
pub async fn list_profiles() -> Result<()> {
    let profiles = AppConfig::list_profiles()?;

    println!("Available configuration profiles:");
    for profile in profiles {
        println!("  - {}", profile);
    }

    Ok(())
}

/// Manage a specific configuration profile
pub async fn manage_profile(profile_name: String) -> Result<()> {
    match AppConfig::load_profile(&profile_name) {
        Ok(config) => {
            println!("Profile: {}", profile_name);
            println!("{:#?}", config);
        }
        Err(_) => {
            warn!(
                "profile '{}' does not exist, creating a default profile",
                profile_name
            );
            let config = AppConfig::default();
            config.save_as_profile(&profile_name)?;
            println!("Created default profile: {}", profile_name);
        }
    }

    Ok(())
}

/// Show the current configuration
pub async fn show_config() -> Result<()> {
    let config = AppConfig::load_default()?;
    println!("Current configuration:");
    println!("{:#?}", config);

    Ok(())
}
