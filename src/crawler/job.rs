use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

/// One unit of crawl work: a single brand's product-listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrandJob {
    /// Store-assigned identifier, unique within the backlog
    pub id: i64,

    /// Display name of the brand
    pub name: String,

    /// Product-listing page for the brand
    pub url: String,
}

/// One scraped product, tied back to its originating brand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRecord {
    pub name: String,
    pub url: String,
    pub brand_name: String,
    pub brand_url: String,
}

/// Outcome of processing one brand job.
///
/// Produced by exactly one worker and consumed by exactly one aggregator
/// pass. A failed result carries the error and leaves the brand's persisted
/// state untouched, so the job stays pending for a future run.
#[derive(Debug)]
pub struct BrandResult {
    pub job: BrandJob,
    pub products: Vec<ProductRecord>,
    pub error: Option<CrawlError>,
}

impl BrandResult {
    pub fn completed(job: BrandJob, products: Vec<ProductRecord>) -> Self {
        Self {
            job,
            products,
            error: None,
        }
    }

    pub fn failed(job: BrandJob, error: CrawlError) -> Self {
        Self {
            job,
            products: Vec::new(),
            error: Some(error),
        }
    }
}

/// Element type of the intake queue.
///
/// Termination is signalled by a dedicated variant rather than a sentinel
/// job, so it can never collide with real data. The dispatcher enqueues
/// exactly one `Shutdown` per live worker after the last job.
#[derive(Debug)]
pub enum WorkItem {
    Brand(BrandJob),
    Shutdown,
}

/// Counters for a single crawl run. Process-local, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Jobs dispatched this run
    pub total: usize,

    /// Jobs whose records were persisted and checkpoint written
    pub completed: usize,

    /// Jobs that produced a failed result or whose persistence failed
    pub failed: usize,

    /// Product records persisted this run
    pub products: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            products: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Number of results observed so far.
    pub fn observed(&self) -> usize {
        self.completed + self.failed
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
