use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::prelude::*;
use tracing::{debug, error};

use crate::browser::session::{CardFields, ProductListSession, SessionProvider};
use crate::cli::config::{BrowserSettings, SelectorSettings};
use crate::error::SessionError;

/// Poll interval for bounded element waits
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A live WebDriver browser tab implementing the session capability.
pub struct WebDriverSession {
    /// WebDriver instance; `None` once the session has been closed
    driver: Option<WebDriver>,

    /// Structural selectors for the product-listing page
    selectors: SelectorSettings,
}

impl WebDriverSession {
    fn driver(&self) -> Result<&WebDriver, SessionError> {
        self.driver.as_ref().ok_or(SessionError::Closed)
    }
}

#[async_trait]
impl ProductListSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        debug!("navigating to: {}", url);
        self.driver()?.goto(url).await?;
        Ok(())
    }

    async fn has_empty_marker(&mut self) -> Result<bool, SessionError> {
        let present = self
            .driver()?
            .query(By::XPath(&self.selectors.empty_marker))
            .nowait()
            .exists()
            .await?;
        Ok(present)
    }

    async fn wait_for_cards(&mut self, timeout: Duration) -> Result<(), SessionError> {
        self.driver()?
            .query(By::Css(&self.selectors.product_card))
            .wait(timeout, WAIT_POLL_INTERVAL)
            .first()
            .await
            .map_err(|_| SessionError::Timeout {
                selector: self.selectors.product_card.clone(),
            })?;
        Ok(())
    }

    async fn content_extent(&mut self) -> Result<u64, SessionError> {
        let ret = self
            .driver()?
            .execute(
                "return document.body.scrollHeight",
                Vec::<serde_json::Value>::new(),
            )
            .await?;
        let height: u64 = ret.convert()?;
        Ok(height)
    }

    async fn reveal_last_card(&mut self) -> Result<(), SessionError> {
        let cards = self
            .driver()?
            .find_all(By::Css(&self.selectors.product_card))
            .await?;
        if let Some(last) = cards.last() {
            last.scroll_into_view().await?;
        }
        Ok(())
    }

    async fn card_fields(&mut self) -> Result<Vec<CardFields>, SessionError> {
        let cards = self
            .driver()?
            .find_all(By::Css(&self.selectors.product_card))
            .await?;

        let mut fields = Vec::with_capacity(cards.len());
        for card in cards {
            // A card that went stale mid-read just yields empty fields; the
            // extractor logs and skips it.
            let name = match card.find(By::Css(&self.selectors.product_name)).await {
                Ok(element) => element.text().await.ok(),
                Err(_) => None,
            };
            let href = card.attr("href").await.ok().flatten();
            fields.push(CardFields { name, href });
        }

        Ok(fields)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await?;
            debug!("browser session closed");
        }
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            // Spawn a task to quit the driver
            tokio::spawn(async move {
                if let Err(e) = driver.quit().await {
                    error!("error closing browser session during drop: {}", e);
                }
            });
        }
    }
}

/// Opens Chrome sessions against a WebDriver endpoint.
pub struct WebDriverProvider {
    config: BrowserSettings,
    selectors: SelectorSettings,
}

impl WebDriverProvider {
    pub fn new(config: BrowserSettings, selectors: SelectorSettings) -> Self {
        Self { config, selectors }
    }
}

#[async_trait]
impl SessionProvider for WebDriverProvider {
    async fn open_session(&self) -> Result<Box<dyn ProductListSession>, SessionError> {
        let mut caps = DesiredCapabilities::chrome();

        caps.add_chrome_arg(&format!("--user-agent={}", self.config.user_agent))?;
        caps.add_chrome_arg(&format!(
            "--window-size={},{}",
            self.config.window_width, self.config.window_height
        ))?;
        caps.add_chrome_arg("--no-sandbox")?;
        caps.add_chrome_arg("--disable-dev-shm-usage")?;

        if self.config.headless {
            caps.set_headless()?;
        }

        let driver = WebDriver::new(&self.config.webdriver_url, caps).await?;
        driver
            .set_page_load_timeout(Duration::from_secs(self.config.page_load_timeout_secs))
            .await?;

        debug!(
            "browser session opened against {}",
            self.config.webdriver_url
        );

        Ok(Box::new(WebDriverSession {
            driver: Some(driver),
            selectors: self.selectors.clone(),
        }))
    }
}
