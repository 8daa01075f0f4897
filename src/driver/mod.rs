//! Page driver: the browser-automation capability the scrape engine runs on.
//!
//! The engine only needs three things from a browser: open a URL, find an
//! element by CSS selector, and read an element's text. Failures come back
//! as a closed [`DriverError`] so callers never inspect native error types.

pub mod chromium;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

pub use chromium::ChromiumDriver;

/// Classified page-driver failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The deadline passed before the operation finished.
    #[error("timeout")]
    Timeout,

    /// A script or navigation failed inside the page.
    #[error("evaluation error{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Evaluation { line: Option<i64>, message: String },

    /// No element matched the selector.
    #[error("no element matches {selector:?}")]
    NotFound { selector: String },

    #[error("{0}")]
    Other(String),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Browser-automation capability.
///
/// `Page` and `Element` are handles owned by the driver implementation.
/// Every page returned by [`navigate`](PageDriver::navigate) must be handed
/// back to [`release`](PageDriver::release).
#[async_trait]
pub trait PageDriver: Send + Sync + 'static {
    type Page: Send + Sync;
    type Element: Send + Sync;

    /// Open `url` in a fresh page, waiting for it to load until `deadline`.
    ///
    /// Must return by `deadline`. A page opened by a failed navigation is
    /// closed before the error is returned.
    async fn navigate(&self, url: &str, deadline: Instant) -> DriverResult<Self::Page>;

    /// Find the first element in the page matching `selector`.
    async fn locate(&self, page: &Self::Page, selector: &str) -> DriverResult<Self::Element>;

    /// Find the first descendant of `element` matching `selector`.
    async fn locate_within(
        &self,
        element: &Self::Element,
        selector: &str,
    ) -> DriverResult<Self::Element>;

    /// Rendered text of an element. Elements without text read as "".
    async fn read_text(&self, element: &Self::Element) -> DriverResult<String>;

    /// Release a page.
    async fn release(&self, page: Self::Page);
}
