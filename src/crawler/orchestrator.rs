use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use crate::browser::session::SessionProvider;
use crate::cli::config::AppConfig;
use crate::crawler::aggregator::ResultAggregator;
use crate::crawler::dispatcher::Dispatcher;
use crate::crawler::job::RunSummary;
use crate::crawler::queue::IntakeQueue;
use crate::crawler::worker::Worker;
use crate::error::CrawlError;
use crate::storage::CatalogStore;

/// Flat run configuration handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Number of parallel workers, fixed for the whole run
    pub worker_count: usize,

    /// Deadline for one whole job, including the scroll loop
    pub job_timeout: Duration,

    /// Bounded wait for the first product card to appear
    pub card_wait_timeout: Duration,

    /// Fixed pause letting lazily-loaded content arrive between scrolls
    pub scroll_settle: Duration,

    /// Pause between consecutive jobs on the same worker
    pub politeness_delay: Duration,

    /// Site origin used to absolutize relative product links
    pub base_url: Url,
}

impl CrawlSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url)
            .context(format!("invalid base URL: {}", config.site.base_url))?;

        Ok(Self {
            worker_count: config.crawler.worker_count.max(1),
            job_timeout: Duration::from_secs(config.crawler.job_timeout_secs),
            card_wait_timeout: Duration::from_secs(config.crawler.card_wait_timeout_secs),
            scroll_settle: Duration::from_millis(config.crawler.scroll_settle_ms),
            politeness_delay: Duration::from_millis(config.crawler.politeness_delay_ms),
            base_url,
        })
    }
}

/// Wires dispatcher, worker pool and aggregator into one bounded run.
///
/// The two queues created here are the only synchronization between the
/// pieces; they are handed into each component rather than living as
/// process-wide state, so independent runs never cross-contaminate.
pub struct CrawlOrchestrator {
    settings: CrawlSettings,
    store: Arc<dyn CatalogStore>,
    sessions: Arc<dyn SessionProvider>,
}

impl CrawlOrchestrator {
    pub fn new(
        settings: CrawlSettings,
        store: Arc<dyn CatalogStore>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            settings,
            store,
            sessions,
        }
    }

    /// Execute one full crawl run.
    ///
    /// The run terminates once every dispatched job has produced a result
    /// and every worker has observed its termination token.
    pub async fn run(&self) -> Result<RunSummary, CrawlError> {
        let run_id = Uuid::new_v4();

        let intake = Arc::new(IntakeQueue::new());
        let dispatcher = Dispatcher::new(self.store.clone(), intake.clone());

        let backlog = dispatcher.load_backlog().await?;
        if backlog.is_empty() {
            info!("run {}: backlog is empty, nothing to crawl", run_id);
            let mut summary = RunSummary::new(0);
            summary.finish();
            return Ok(summary);
        }

        let total = backlog.len();
        let worker_count = self.settings.worker_count.max(1);
        info!(
            "run {}: {} pending brands across {} workers",
            run_id, total, worker_count
        );

        // Open every session up front so a broken automation endpoint
        // fails the run before anything is dispatched.
        let mut sessions = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            match self.sessions.open_session().await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    for mut open in sessions {
                        let _ = open.close().await;
                    }
                    return Err(CrawlError::Session(e));
                }
            }
        }

        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(worker_count);
        for (id, session) in sessions.into_iter().enumerate() {
            let worker = Worker::new(
                id,
                self.settings.clone(),
                intake.clone(),
                results_tx.clone(),
            );
            handles.push(tokio::spawn(worker.run(session)));
        }
        drop(results_tx);

        dispatcher.dispatch(backlog, worker_count);

        let aggregator = ResultAggregator::new(self.store.clone());
        let summary = aggregator.drain(results_rx, total).await;

        // Every worker exits by consuming its termination token
        for (id, outcome) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = outcome {
                error!("worker {} did not shut down cleanly: {}", id, e);
            }
        }

        info!(
            "run {} finished: {}/{} brands completed, {} failed, {} products persisted",
            run_id, summary.completed, summary.total, summary.failed, summary.products
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::session::{CardFields, ProductListSession};
    use crate::crawler::job::{BrandJob, ProductRecord};
    use crate::error::{SessionError, StoreError};
    use crate::sitemap::BrandEntry;
    use crate::storage::{CatalogStore, ProductPage, StoreCounts};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn test_settings(workers: usize) -> CrawlSettings {
        CrawlSettings {
            worker_count: workers,
            job_timeout: Duration::from_secs(30),
            card_wait_timeout: Duration::from_millis(100),
            scroll_settle: Duration::ZERO,
            politeness_delay: Duration::ZERO,
            base_url: Url::parse("https://shop.example.com").expect("valid base url"),
        }
    }

    /// Scripted browser session: every brand page carries one product card,
    /// except URLs configured to time out on the card wait.
    struct FakeSession {
        current_url: Option<String>,
        navigated: Arc<Mutex<Vec<String>>>,
        timeout_urls: Arc<HashSet<String>>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProductListSession for FakeSession {
        async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
            self.navigated
                .lock()
                .expect("lock poisoned")
                .push(url.to_string());
            self.current_url = Some(url.to_string());
            Ok(())
        }

        async fn has_empty_marker(&mut self) -> Result<bool, SessionError> {
            Ok(false)
        }

        async fn wait_for_cards(&mut self, _timeout: Duration) -> Result<(), SessionError> {
            let current = self.current_url.as_deref().unwrap_or_default();
            if self.timeout_urls.contains(current) {
                return Err(SessionError::Timeout {
                    selector: "card".to_string(),
                });
            }
            Ok(())
        }

        async fn content_extent(&mut self) -> Result<u64, SessionError> {
            Ok(1000)
        }

        async fn reveal_last_card(&mut self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn card_fields(&mut self) -> Result<Vec<CardFields>, SessionError> {
            let current = self.current_url.clone().unwrap_or_default();
            Ok(vec![CardFields {
                name: Some(format!("product of {}", current)),
                href: Some(format!("{}/product-1", current)),
            }])
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeProvider {
        created: AtomicUsize,
        closed: Arc<AtomicUsize>,
        navigated: Arc<Mutex<Vec<String>>>,
        timeout_urls: Arc<HashSet<String>>,
    }

    impl FakeProvider {
        fn new(timeout_urls: HashSet<String>) -> Self {
            Self {
                created: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
                navigated: Arc::new(Mutex::new(Vec::new())),
                timeout_urls: Arc::new(timeout_urls),
            }
        }

        fn navigated_urls(&self) -> Vec<String> {
            self.navigated.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl crate::browser::session::SessionProvider for FakeProvider {
        async fn open_session(&self) -> Result<Box<dyn ProductListSession>, SessionError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                current_url: None,
                navigated: self.navigated.clone(),
                timeout_urls: self.timeout_urls.clone(),
                closed: self.closed.clone(),
            }))
        }
    }

    /// In-memory store with the same pending/completed semantics as the
    /// real one.
    struct MemoryStore {
        brands: Mutex<Vec<(BrandJob, bool)>>,
        products: Mutex<Vec<ProductRecord>>,
    }

    impl MemoryStore {
        fn with_brands(count: i64) -> Self {
            let brands = (1..=count)
                .map(|id| {
                    (
                        BrandJob {
                            id,
                            name: format!("brand-{}", id),
                            url: format!("https://shop.example.com/brand/brand-{}", id),
                        },
                        false,
                    )
                })
                .collect();
            Self {
                brands: Mutex::new(brands),
                products: Mutex::new(Vec::new()),
            }
        }

        fn pending_ids(&self) -> Vec<i64> {
            self.brands
                .lock()
                .expect("lock poisoned")
                .iter()
                .filter(|(_, done)| !done)
                .map(|(job, _)| job.id)
                .collect()
        }
    }

    #[async_trait]
    impl CatalogStore for MemoryStore {
        async fn pending_brands(&self) -> Result<Vec<BrandJob>, StoreError> {
            Ok(self
                .brands
                .lock()
                .expect("lock poisoned")
                .iter()
                .filter(|(_, done)| !done)
                .map(|(job, _)| job.clone())
                .collect())
        }

        async fn insert_brands(&self, entries: &[BrandEntry]) -> Result<u64, StoreError> {
            let mut brands = self.brands.lock().expect("lock poisoned");
            let next_id = brands.len() as i64 + 1;
            for (offset, entry) in entries.iter().enumerate() {
                brands.push((
                    BrandJob {
                        id: next_id + offset as i64,
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                    },
                    false,
                ));
            }
            Ok(entries.len() as u64)
        }

        async fn insert_products(&self, products: &[ProductRecord]) -> Result<(), StoreError> {
            self.products
                .lock()
                .expect("lock poisoned")
                .extend_from_slice(products);
            Ok(())
        }

        async fn mark_brand_completed(&self, brand_id: i64) -> Result<(), StoreError> {
            let mut brands = self.brands.lock().expect("lock poisoned");
            for (job, done) in brands.iter_mut() {
                if job.id == brand_id {
                    *done = true;
                }
            }
            Ok(())
        }

        async fn all_products(&self) -> Result<Vec<ProductPage>, StoreError> {
            Ok(self
                .products
                .lock()
                .expect("lock poisoned")
                .iter()
                .enumerate()
                .map(|(i, p)| ProductPage {
                    id: i as i64 + 1,
                    name: p.name.clone(),
                    url: p.url.clone(),
                })
                .collect())
        }

        async fn counts(&self) -> Result<StoreCounts, StoreError> {
            let brands = self.brands.lock().expect("lock poisoned");
            Ok(StoreCounts {
                brands_total: brands.len() as i64,
                brands_completed: brands.iter().filter(|(_, done)| *done).count() as i64,
                products: self.products.lock().expect("lock poisoned").len() as i64,
            })
        }
    }

    #[tokio::test]
    async fn every_pending_brand_is_crawled_exactly_once() {
        let store = Arc::new(MemoryStore::with_brands(7));
        let provider = Arc::new(FakeProvider::new(HashSet::new()));
        let orchestrator =
            CrawlOrchestrator::new(test_settings(3), store.clone(), provider.clone());

        let summary = orchestrator.run().await.expect("run should succeed");

        assert_eq!(summary.total, 7);
        assert_eq!(summary.completed, 7);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.products, 7);
        assert!(store.pending_ids().is_empty());

        // No brand navigated twice, none skipped
        let mut navigated = provider.navigated_urls();
        navigated.sort();
        let mut expected: Vec<String> = (1..=7)
            .map(|id| format!("https://shop.example.com/brand/brand-{}", id))
            .collect();
        expected.sort();
        assert_eq!(navigated, expected);
    }

    #[tokio::test]
    async fn each_worker_gets_its_own_session_and_releases_it() {
        let store = Arc::new(MemoryStore::with_brands(5));
        let provider = Arc::new(FakeProvider::new(HashSet::new()));
        let orchestrator =
            CrawlOrchestrator::new(test_settings(3), store, provider.clone());

        orchestrator.run().await.expect("run should succeed");

        assert_eq!(provider.created.load(Ordering::SeqCst), 3);
        assert_eq!(provider.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_backlog_short_circuits_without_workers() {
        let store = Arc::new(MemoryStore::with_brands(0));
        let provider = Arc::new(FakeProvider::new(HashSet::new()));
        let orchestrator =
            CrawlOrchestrator::new(test_settings(4), store, provider.clone());

        let summary = orchestrator.run().await.expect("run should succeed");

        assert_eq!(summary.total, 0);
        assert_eq!(provider.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_brand_stays_pending_and_only_it_is_redispatched() {
        let store = Arc::new(MemoryStore::with_brands(3));
        let failing = "https://shop.example.com/brand/brand-2".to_string();

        // First run: brand 2 times out waiting for its cards
        let provider = Arc::new(FakeProvider::new(HashSet::from([failing.clone()])));
        let orchestrator =
            CrawlOrchestrator::new(test_settings(2), store.clone(), provider);
        let summary = orchestrator.run().await.expect("run should succeed");

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.pending_ids(), vec![2]);

        // Second run against the same store: only brand 2 is dispatched
        let provider = Arc::new(FakeProvider::new(HashSet::new()));
        let orchestrator =
            CrawlOrchestrator::new(test_settings(2), store.clone(), provider.clone());
        let summary = orchestrator.run().await.expect("run should succeed");

        assert_eq!(summary.total, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(provider.navigated_urls(), vec![failing]);
        assert!(store.pending_ids().is_empty());
    }
}
