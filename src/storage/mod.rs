pub mod catalog;

// Re-export common types
pub use catalog::{CatalogStore, PostgresCatalogStore, ProductPage, StoreCounts};

#[cfg(test)]
pub use catalog::MockCatalogStore;
