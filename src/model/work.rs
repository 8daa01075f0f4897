//! Work item: the validated URL a delivery asks us to crawl.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A URL that passed validation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkItem(String);

impl WorkItem {
    /// Validate a URL string.
    ///
    /// Surrounding whitespace is ignored. The value must be an absolute URL
    /// with a host.
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        let parsed = url::Url::parse(value).map_err(|e| ValidationError::InvalidUrl {
            value: value.to_string(),
            reason: e.to_string(),
        })?;

        if !parsed.has_host() {
            return Err(ValidationError::InvalidUrl {
                value: value.to_string(),
                reason: "url has no host".to_string(),
            });
        }

        Ok(Self(value.to_string()))
    }

    /// Decode a raw delivery payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ValidationError> {
        let text = std::str::from_utf8(payload).map_err(|_| ValidationError::NotUtf8)?;
        Self::new(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WorkItem {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<WorkItem> for String {
    fn from(item: WorkItem) -> Self {
        item.0
    }
}
