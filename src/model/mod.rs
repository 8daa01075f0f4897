//! Core data model.
//!
//! A work item is a validated URL taken off the queue. A record is what a
//! successful scrape produces. Every field goes through a constructor that
//! validates it, so a record that exists is well-formed.

pub mod record;
pub mod work;

use thiserror::Error;

pub use record::{ApplicationName, Rating, RatingsAmount, Record};
pub use work::WorkItem;

/// A value failed validation on construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("url could not be empty")]
    EmptyUrl,

    #[error("invalid url {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("payload is not valid utf-8")]
    NotUtf8,

    #[error("application name could not be empty")]
    EmptyName,

    #[error("rating has to be a non-negative number, got {0}")]
    InvalidRating(f32),
}
