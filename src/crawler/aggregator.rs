use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::crawler::job::{BrandResult, RunSummary};
use crate::storage::CatalogStore;

/// Drains the results queue and makes each completed job durable.
///
/// Persistence order per job is fixed: records first, checkpoint second.
/// A store failure between the two leaves the brand's records persisted but
/// unchecked, so the next run re-crawls it and inserts duplicates; that
/// window is accepted rather than papered over with an upsert the store
/// does not offer.
pub struct ResultAggregator {
    store: Arc<dyn CatalogStore>,
}

impl ResultAggregator {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Consume results until exactly `total` have been observed.
    ///
    /// Completion order is arbitrary; workers run at independent speeds and
    /// no assumption is made about dispatch order.
    pub async fn drain(
        &self,
        mut results: mpsc::UnboundedReceiver<BrandResult>,
        total: usize,
    ) -> RunSummary {
        let mut summary = RunSummary::new(total);

        while summary.observed() < total {
            let Some(result) = results.recv().await else {
                warn!(
                    "results channel closed after {}/{} results",
                    summary.observed(),
                    total
                );
                break;
            };

            self.record(result, &mut summary).await;
            info!("progress: {}/{} brands", summary.observed(), summary.total);
        }

        summary.finish();
        summary
    }

    async fn record(&self, result: BrandResult, summary: &mut RunSummary) {
        if let Some(crawl_error) = result.error {
            // No checkpoint: the brand stays pending for a future run
            warn!("brand '{}' failed: {}", result.job.name, crawl_error);
            summary.failed += 1;
            return;
        }

        if !result.products.is_empty() {
            if let Err(e) = self.store.insert_products(&result.products).await {
                error!(
                    "failed to persist {} products for brand '{}': {}",
                    result.products.len(),
                    result.job.name,
                    e
                );
                summary.failed += 1;
                return;
            }
        }

        if let Err(e) = self.store.mark_brand_completed(result.job.id).await {
            error!(
                "brand '{}' persisted but its checkpoint failed, it will be re-crawled: {}",
                result.job.name, e
            );
            summary.failed += 1;
            return;
        }

        summary.completed += 1;
        summary.products += result.products.len();
    }
}
