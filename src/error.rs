use thiserror::Error;

/// Errors raised at the browser session boundary.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The underlying WebDriver call failed
    #[error("webdriver error: {0}")]
    Driver(#[from] thirtyfour::error::WebDriverError),

    /// An expected element never appeared within the bounded wait
    #[error("timed out waiting for '{selector}'")]
    Timeout { selector: String },

    /// The session was used after it was closed
    #[error("browser session is closed")]
    Closed,
}

/// Errors raised by the catalog store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Per-job and run-level crawl failures.
///
/// Job-scoped variants (`Navigation`, `Timeout`, `Session`) are caught at
/// the worker boundary and turned into failed results; `Backlog` is fatal
/// and aborts the run before any worker starts.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The initial load of the pending-brand backlog failed
    #[error("failed to load the pending brand backlog")]
    Backlog(#[source] StoreError),

    /// The session could not reach or render the target page
    #[error("navigation to {url} failed")]
    Navigation {
        url: String,
        #[source]
        source: SessionError,
    },

    /// An element wait or the per-job deadline expired
    #[error("timed out {what}")]
    Timeout { what: String },

    /// Any other browser session failure while processing a job
    #[error("browser session failure")]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_the_wait() {
        let err = CrawlError::Timeout {
            what: "waiting for product cards".to_string(),
        };
        assert_eq!(err.to_string(), "timed out waiting for product cards");
    }

    #[test]
    fn navigation_keeps_its_source() {
        use std::error::Error;

        let err = CrawlError::Navigation {
            url: "https://example.com/brand/Acme".to_string(),
            source: SessionError::Closed,
        };
        assert!(err.source().is_some());
    }
}
