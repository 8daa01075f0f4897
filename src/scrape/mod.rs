//! Scrape engine: drives a page driver through the channel details template.
//!
//! One scrape is four phases under a single deadline:
//! navigate → locate container → read fields → validate into a [`Record`].
//! Any failure comes back as a classified [`ScrapeError`].

pub mod template;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::driver::{DriverError, PageDriver};
use crate::model::{ApplicationName, Rating, RatingsAmount, Record, ValidationError, WorkItem};
use template::{
    CONTAINER_SELECTOR, NAME_SELECTOR, RATING_SELECTOR, RATINGS_AMOUNT_SELECTOR,
    parse_rating, parse_ratings_amount,
};

/// Why a scrape failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScrapeError {
    #[error("timeout")]
    Timeout,

    #[error("evaluation error{}: {message}", .line.map(|l| format!(", line: {l}")).unwrap_or_default())]
    Evaluation { line: Option<i64>, message: String },

    #[error("element not found: {selector}")]
    NotFound { selector: String },

    #[error("invalid {field}: {reason}")]
    InvalidData { field: &'static str, reason: String },

    #[error("unable to scrape website: {0}")]
    Driver(String),
}

impl ScrapeError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Timeout => "timeout",
            ScrapeError::Evaluation { .. } => "evaluation_error",
            ScrapeError::NotFound { .. } => "not_found",
            ScrapeError::InvalidData { .. } => "invalid_data",
            ScrapeError::Driver(_) => "driver_error",
        }
    }

    fn invalid(field: &'static str, err: impl ToString) -> Self {
        ScrapeError::InvalidData {
            field,
            reason: err.to_string(),
        }
    }
}

impl From<DriverError> for ScrapeError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Timeout => ScrapeError::Timeout,
            DriverError::Evaluation { line, message } => ScrapeError::Evaluation { line, message },
            DriverError::NotFound { selector } => ScrapeError::NotFound { selector },
            DriverError::Other(message) => ScrapeError::Driver(message),
        }
    }
}

/// Anything that turns a work item into a record.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, item: &WorkItem, deadline: Instant) -> Result<Record, ScrapeError>;
}

/// Scrapes the fixed channel template through a [`PageDriver`].
pub struct ScrapeEngine<D: PageDriver> {
    driver: Arc<D>,
}

impl<D: PageDriver> ScrapeEngine<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }

    async fn extract(&self, page: &D::Page, item: &WorkItem) -> Result<Record, ScrapeError> {
        let container = self.driver.locate(page, CONTAINER_SELECTOR).await?;

        let name = self.read_required(&container, NAME_SELECTOR).await?;
        let rating = self.read_optional(&container, RATING_SELECTOR).await?;
        let ratings_amount = self.read_optional(&container, RATINGS_AMOUNT_SELECTOR).await?;

        build_record(item, &name, rating.as_deref(), ratings_amount.as_deref())
    }

    async fn read_required(
        &self,
        container: &D::Element,
        selector: &str,
    ) -> Result<String, ScrapeError> {
        let element = self.driver.locate_within(container, selector).await?;
        Ok(self.driver.read_text(&element).await?)
    }

    /// A missing element reads as `None`; every other failure propagates.
    async fn read_optional(
        &self,
        container: &D::Element,
        selector: &str,
    ) -> Result<Option<String>, ScrapeError> {
        match self.driver.locate_within(container, selector).await {
            Ok(element) => Ok(Some(self.driver.read_text(&element).await?)),
            Err(DriverError::NotFound { .. }) => {
                debug!(selector, "optional field absent");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<D: PageDriver> Scraper for ScrapeEngine<D> {
    async fn scrape(&self, item: &WorkItem, deadline: Instant) -> Result<Record, ScrapeError> {
        // navigate bounds itself by the deadline and closes its own page on
        // failure; wrapping it in another timeout would drop that cleanup.
        let page = self.driver.navigate(item.as_str(), deadline).await?;
        debug!(url = %item, "page loaded");

        let result = tokio::time::timeout_at(deadline, self.extract(&page, item))
            .await
            .unwrap_or(Err(ScrapeError::Timeout));

        self.driver.release(page).await;
        result
    }
}

/// Validate raw field text into a record.
///
/// Absent rating and ratings amount default to zero. Present values go
/// through the same constructors as everywhere else, so bad text surfaces
/// as [`ScrapeError::InvalidData`].
pub fn build_record(
    item: &WorkItem,
    name: &str,
    rating: Option<&str>,
    ratings_amount: Option<&str>,
) -> Result<Record, ScrapeError> {
    let application_name =
        ApplicationName::new(name).map_err(|e| ScrapeError::invalid("application name", e))?;

    let rating_value = match rating {
        Some(text) => parse_rating(text).map_err(|e| ScrapeError::invalid("rating", e))?,
        None => 0.0,
    };
    let rating =
        Rating::new(rating_value).map_err(|e: ValidationError| ScrapeError::invalid("rating", e))?;

    let amount = match ratings_amount {
        Some(text) => {
            parse_ratings_amount(text).map_err(|e| ScrapeError::invalid("ratings amount", e))?
        }
        None => 0,
    };

    Ok(Record::new(
        application_name,
        item.clone(),
        rating,
        RatingsAmount::new(amount),
    ))
}
