pub mod aggregator;
pub mod dispatcher;
pub mod extract;
pub mod job;
pub mod orchestrator;
pub mod queue;
pub mod scroll;
pub mod worker;

// Re-export common types
pub use job::{BrandJob, BrandResult, ProductRecord, RunSummary, WorkItem};
pub use orchestrator::{CrawlOrchestrator, CrawlSettings};
