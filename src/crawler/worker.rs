use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{thread_rng, Rng};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::browser::session::ProductListSession;
use crate::crawler::extract;
use crate::crawler::job::{BrandJob, BrandResult, ProductRecord, WorkItem};
use crate::crawler::orchestrator::CrawlSettings;
use crate::crawler::queue::IntakeQueue;
use crate::crawler::scroll;
use crate::error::{CrawlError, SessionError};

/// One member of the crawl pool.
///
/// A worker owns a single browser session for its entire lifetime and
/// processes jobs strictly sequentially. Per-job failures become failed
/// results; they never crash the worker, which simply moves on to the next
/// queue item. The session is released when the termination token is
/// observed, even if every job before it failed.
pub struct Worker {
    id: usize,
    settings: CrawlSettings,
    intake: Arc<IntakeQueue>,
    results: mpsc::UnboundedSender<BrandResult>,
}

impl Worker {
    pub fn new(
        id: usize,
        settings: CrawlSettings,
        intake: Arc<IntakeQueue>,
        results: mpsc::UnboundedSender<BrandResult>,
    ) -> Self {
        Self {
            id,
            settings,
            intake,
            results,
        }
    }

    pub async fn run(self, mut session: Box<dyn ProductListSession>) {
        info!("worker {} started", self.id);
        let mut processed = 0usize;

        loop {
            match self.intake.pop().await {
                Some(WorkItem::Brand(job)) => {
                    let started = Instant::now();
                    let result = self.process_job(session.as_mut(), job).await;
                    processed += 1;

                    debug!(
                        "worker {} finished brand '{}' in {} ms",
                        self.id,
                        result.job.name,
                        started.elapsed().as_millis()
                    );

                    if self.results.send(result).is_err() {
                        warn!("worker {}: results channel closed, stopping", self.id);
                        break;
                    }

                    self.politeness_pause().await;
                }
                // A closed queue cannot happen while the run is live; treat
                // it like a termination token.
                Some(WorkItem::Shutdown) | None => break,
            }
        }

        // Session teardown is mandatory on the shutdown path
        if let Err(e) = session.close().await {
            warn!("worker {} failed to close its session: {}", self.id, e);
        }

        info!("worker {} stopped after {} brands", self.id, processed);
    }

    /// Run one job under the per-job deadline.
    ///
    /// The deadline bounds the whole job body, which is what keeps the
    /// otherwise unbounded scroll loop from live-locking against a page
    /// that never stabilizes.
    async fn process_job(
        &self,
        session: &mut dyn ProductListSession,
        job: BrandJob,
    ) -> BrandResult {
        let outcome = timeout(
            self.settings.job_timeout,
            process_brand(session, &job, &self.settings),
        )
        .await;

        match outcome {
            Ok(Ok(products)) => BrandResult::completed(job, products),
            Ok(Err(error)) => BrandResult::failed(job, error),
            Err(_) => {
                let what = format!("processing brand '{}'", job.name);
                BrandResult::failed(job, CrawlError::Timeout { what })
            }
        }
    }

    /// Short jittered pause between jobs.
    async fn politeness_pause(&self) {
        let base = self.settings.politeness_delay;
        if base.is_zero() {
            return;
        }
        let max_jitter = (base.as_millis() as u64) / 2;
        let jitter = if max_jitter == 0 {
            0
        } else {
            thread_rng().gen_range(0..=max_jitter)
        };
        sleep(base + Duration::from_millis(jitter)).await;
    }
}

/// Crawl one brand's product listing to completion.
async fn process_brand(
    session: &mut dyn ProductListSession,
    job: &BrandJob,
    settings: &CrawlSettings,
) -> Result<Vec<ProductRecord>, CrawlError> {
    session
        .navigate(&job.url)
        .await
        .map_err(|source| CrawlError::Navigation {
            url: job.url.clone(),
            source,
        })?;

    // A brand with nothing listed shows an explicit marker; short-circuit
    // to an empty success without ever entering the scroll loop.
    if session.has_empty_marker().await? {
        debug!("no products listed for brand '{}'", job.name);
        return Ok(Vec::new());
    }

    session
        .wait_for_cards(settings.card_wait_timeout)
        .await
        .map_err(|e| match e {
            SessionError::Timeout { selector } => CrawlError::Timeout {
                what: format!("waiting for '{}'", selector),
            },
            other => CrawlError::Session(other),
        })?;

    scroll::load_all_cards(&mut *session, settings.scroll_settle).await?;

    let products = extract::extract_products(&mut *session, job, &settings.base_url).await?;
    debug!("extracted {} products for brand '{}'", products.len(), job.name);

    Ok(products)
}
