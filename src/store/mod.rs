//! Record store: where scraped channel records end up.
//!
//! Upserts are keyed by application name, not URL. Two URLs that resolve
//! to the same channel overwrite one stored record; the latest write wins.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Record;

pub use postgres::PgRecordStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to save record {name:?}: {source}")]
    Save {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to load record {name:?}: {source}")]
    Load {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("store deadline exceeded")]
    Timeout,

    #[error("corrupt stored record {name:?}: {reason}")]
    Corrupt { name: String, reason: String },
}

/// Persistence for scraped records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or overwrite the record with the same application name.
    async fn upsert(&self, record: Record) -> Result<(), StoreError>;
}

/// A record as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub application_name: String,
    pub url: String,
    /// One decimal place.
    pub rating: String,
    pub number_of_ratings: u32,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn from_record(record: &Record, updated_at: DateTime<Utc>) -> Self {
        Self {
            application_name: record.application_name.as_str().to_string(),
            url: record.url.as_str().to_string(),
            rating: record.rating.formatted(),
            number_of_ratings: record.number_of_ratings.value(),
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApplicationName, Rating, RatingsAmount, WorkItem};

    #[test]
    fn stored_record_formats_rating_and_uses_camel_case() {
        let record = Record::new(
            ApplicationName::new("Netflix").unwrap(),
            WorkItem::new("https://example.com/netflix").unwrap(),
            Rating::new(3.86).unwrap(),
            RatingsAmount::new(4195815),
        );
        let now = Utc::now();
        let stored = StoredRecord::from_record(&record, now);
        assert_eq!(stored.rating, "3.9");
        assert_eq!(stored.number_of_ratings, 4195815);

        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["applicationName"], "Netflix");
        assert_eq!(json["url"], "https://example.com/netflix");
        assert_eq!(json["numberOfRatings"], 4195815);
        assert!(json.get("updatedAt").is_some());
    }
}
