use std::sync::Arc;

use tracing::info;

use crate::crawler::job::{BrandJob, WorkItem};
use crate::crawler::queue::IntakeQueue;
use crate::error::CrawlError;
use crate::storage::CatalogStore;

/// Feeds the worker pool from the durable backlog.
///
/// The backlog is loaded exactly once per run; a load failure is fatal and
/// aborts the run before any worker starts. Dispatch pushes every job in
/// store order followed by one termination token per live worker.
pub struct Dispatcher {
    store: Arc<dyn CatalogStore>,
    intake: Arc<IntakeQueue>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn CatalogStore>, intake: Arc<IntakeQueue>) -> Self {
        Self { store, intake }
    }

    /// Load the set of brands not yet checkpointed as completed.
    pub async fn load_backlog(&self) -> Result<Vec<BrandJob>, CrawlError> {
        self.store
            .pending_brands()
            .await
            .map_err(CrawlError::Backlog)
    }

    /// Push the whole backlog, then `worker_count` shutdown tokens.
    ///
    /// No reordering, no priority, and no job is ever enqueued twice within
    /// a run.
    pub fn dispatch(&self, jobs: Vec<BrandJob>, worker_count: usize) -> usize {
        let total = jobs.len();

        for job in jobs {
            self.intake.push(WorkItem::Brand(job));
        }
        for _ in 0..worker_count {
            self.intake.push(WorkItem::Shutdown);
        }

        info!(
            "dispatched {} brands and {} termination tokens",
            total, worker_count
        );

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::storage::MockCatalogStore;

    fn job(id: i64) -> BrandJob {
        BrandJob {
            id,
            name: format!("brand-{}", id),
            url: format!("https://example.com/brand/brand-{}", id),
        }
    }

    #[tokio::test]
    async fn dispatches_jobs_in_order_then_tokens() {
        let store = MockCatalogStore::new();
        let intake = Arc::new(IntakeQueue::new());
        let dispatcher = Dispatcher::new(Arc::new(store), intake.clone());

        let total = dispatcher.dispatch(vec![job(1), job(2), job(3)], 2);
        assert_eq!(total, 3);

        for expected in 1..=3 {
            match intake.pop().await {
                Some(WorkItem::Brand(j)) => assert_eq!(j.id, expected),
                other => panic!("expected brand {}, got {:?}", expected, other),
            }
        }
        assert!(matches!(intake.pop().await, Some(WorkItem::Shutdown)));
        assert!(matches!(intake.pop().await, Some(WorkItem::Shutdown)));
    }

    #[tokio::test]
    async fn backlog_failure_is_fatal() {
        let mut store = MockCatalogStore::new();
        store
            .expect_pending_brands()
            .returning(|| Err(StoreError::Database(sqlx::Error::PoolClosed)));

        let dispatcher = Dispatcher::new(Arc::new(store), Arc::new(IntakeQueue::new()));
        let result = dispatcher.load_backlog().await;

        assert!(matches!(result, Err(CrawlError::Backlog(_))));
    }
}
