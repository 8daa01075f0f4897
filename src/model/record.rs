//! The structured result of a successful scrape.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ValidationError, WorkItem};

/// Display name of the scraped channel. Identity key for upserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationName(String);

impl ApplicationName {
    pub fn new(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Average rating. Always finite and never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating(f32);

impl Rating {
    pub fn new(value: f32) -> Result<Self, ValidationError> {
        if !value.is_finite() || value < 0.0 {
            return Err(ValidationError::InvalidRating(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// One decimal place, as persisted.
    pub fn formatted(self) -> String {
        format!("{:.1}", self.0)
    }
}

/// Number of ratings the channel has received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingsAmount(u32);

impl RatingsAmount {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// A scraped channel record.
///
/// Owned by the worker that produced it until handed to the store by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub application_name: ApplicationName,
    pub url: WorkItem,
    pub rating: Rating,
    pub number_of_ratings: RatingsAmount,
}

impl Record {
    pub fn new(
        application_name: ApplicationName,
        url: WorkItem,
        rating: Rating,
        number_of_ratings: RatingsAmount,
    ) -> Self {
        Self {
            application_name,
            url,
            rating,
            number_of_ratings,
        }
    }
}
