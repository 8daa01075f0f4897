//! Headless Chromium page driver built on chromiumoxide.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::Path;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::{DriverError, DriverResult, PageDriver};
use crate::error::{Error, Result};
use crate::supervisor::Lifecycle;

/// Chrome reports a selector miss as a failed node lookup.
const MISSING_NODE_MARKERS: [&str; 2] = ["Could not find node", "No node with given id"];

/// One headless Chromium process shared by all workers.
///
/// Pages are created per scrape; the browser itself lives until the
/// process scope closes it.
pub struct ChromiumDriver {
    browser: RwLock<Browser>,
    handler: JoinHandle<()>,
}

impl ChromiumDriver {
    /// Launch headless Chromium. Uses `chrome_bin` when given, otherwise
    /// chromiumoxide's own executable detection.
    pub async fn launch(chrome_bin: Option<&Path>) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking");
        if let Some(path) = chrome_bin {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| Error::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::Browser(format!("failed to launch chromium: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("browser handler error: {e}");
                }
            }
            debug!("browser event handler finished");
        });

        info!("headless browser launched");

        Ok(Self {
            browser: RwLock::new(browser),
            handler,
        })
    }

    async fn open_page(&self, url: &str, deadline: Instant) -> DriverResult<Page> {
        let page = tokio::time::timeout_at(deadline, async {
            self.browser.read().await.new_page("about:blank").await
        })
        .await
        .map_err(|_| DriverError::Timeout)?
        .map_err(|e| classify_navigation(&e))?;

        let loaded = tokio::time::timeout_at(deadline, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        })
        .await;

        let failure = match loaded {
            Ok(Ok(())) => return Ok(page),
            Ok(Err(e)) => classify_navigation(&e),
            Err(_) => DriverError::Timeout,
        };

        if let Err(e) = page.close().await {
            trace!("failed to close page after navigation failure: {e}");
        }
        Err(failure)
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    type Page = Page;
    type Element = Element;

    async fn navigate(&self, url: &str, deadline: Instant) -> DriverResult<Page> {
        let page = self.open_page(url, deadline).await?;
        debug!(url, "page opened");
        Ok(page)
    }

    async fn locate(&self, page: &Page, selector: &str) -> DriverResult<Element> {
        page.find_element(selector)
            .await
            .map_err(|e| classify_lookup(&e, selector))
    }

    async fn locate_within(&self, element: &Element, selector: &str) -> DriverResult<Element> {
        element
            .find_element(selector)
            .await
            .map_err(|e| classify_lookup(&e, selector))
    }

    async fn read_text(&self, element: &Element) -> DriverResult<String> {
        element
            .inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| classify(&e))
    }

    async fn release(&self, page: Page) {
        if let Err(e) = page.close().await {
            trace!("failed to close page: {e}");
        }
    }
}

#[async_trait]
impl Lifecycle for ChromiumDriver {
    fn name(&self) -> &str {
        "browser"
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("browser close error: {e}");
        }
        if let Err(e) = browser.wait().await {
            warn!("browser wait error: {e}");
        }
        self.handler.abort();
        info!("headless browser closed");
        Ok(())
    }
}

/// Map a chromiumoxide error onto the closed driver taxonomy.
fn classify(err: &CdpError) -> DriverError {
    match err {
        CdpError::Timeout => DriverError::Timeout,
        CdpError::JavascriptException(details) => DriverError::Evaluation {
            line: Some(details.line_number),
            message: details.text.clone(),
        },
        other => DriverError::Other(other.to_string()),
    }
}

/// A failed lookup is either a missing element or a real driver fault.
fn classify_lookup(err: &CdpError, selector: &str) -> DriverError {
    let message = err.to_string();
    if MISSING_NODE_MARKERS.iter().any(|m| message.contains(m)) {
        return DriverError::NotFound {
            selector: selector.to_string(),
        };
    }
    classify(err)
}

/// Navigation failures (DNS, refused connections, aborted loads) surface
/// as in-page evaluation errors without a location.
fn classify_navigation(err: &CdpError) -> DriverError {
    match classify(err) {
        DriverError::Other(message) => DriverError::Evaluation {
            line: None,
            message,
        },
        classified => classified,
    }
}
