use std::time::Duration;

use async_trait::async_trait;

use crate::error::SessionError;

/// Raw name and link attribute of one product card, as read off the page.
///
/// Either field may be absent; the extractor decides what to do with an
/// incomplete card.
#[derive(Debug, Clone, Default)]
pub struct CardFields {
    pub name: Option<String>,
    pub href: Option<String>,
}

/// Capability consumed by the crawl core for driving one live browser tab.
///
/// Implementations own the real automation primitive; the core only ever
/// talks to this trait, which keeps the workers and the scroll-completion
/// detector testable against scripted doubles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductListSession: Send {
    /// Navigate the session to the given URL.
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Whether the page shows its "no products for this brand" marker.
    async fn has_empty_marker(&mut self) -> Result<bool, SessionError>;

    /// Wait until at least one product card is present.
    ///
    /// Fails with [`SessionError::Timeout`] if none appears within the
    /// bound.
    async fn wait_for_cards(&mut self, timeout: Duration) -> Result<(), SessionError>;

    /// Current content-extent metric of the page.
    ///
    /// Grows as lazily-loaded batches arrive; two consecutive equal reads
    /// mean the list has finished loading.
    async fn content_extent(&mut self) -> Result<u64, SessionError>;

    /// Scroll the last loaded card into view to trigger the next batch.
    async fn reveal_last_card(&mut self) -> Result<(), SessionError>;

    /// Read the name and link attribute of every loaded card.
    async fn card_fields(&mut self) -> Result<Vec<CardFields>, SessionError>;

    /// Tear the session down. Mandatory on the worker shutdown path.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Opens a fresh browser session for a worker.
///
/// Each worker receives exactly one session for its whole lifetime;
/// sessions are never pooled or shared.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn ProductListSession>, SessionError>;
}
