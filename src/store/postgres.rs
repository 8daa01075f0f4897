//! Postgres-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use std::sync::Arc;
use tracing::debug;

use super::{RecordStore, StoreError, StoredRecord};
use crate::db::Db;
use crate::model::Record;
use crate::telemetry::metrics;

pub struct PgRecordStore {
    db: Arc<Db>,
}

impl PgRecordStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Load the stored record for an application name.
    pub async fn get(&self, application_name: &str) -> Result<Option<StoredRecord>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, DateTime<Utc>)>(
            "SELECT application_name, url, rating, number_of_ratings, updated_at
             FROM channels WHERE application_name = $1",
        )
        .bind(application_name)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|source| StoreError::Load {
            name: application_name.to_string(),
            source,
        })?;

        let Some((application_name, url, rating, number_of_ratings, updated_at)) = row else {
            return Ok(None);
        };

        let number_of_ratings =
            u32::try_from(number_of_ratings).map_err(|e| StoreError::Corrupt {
                name: application_name.clone(),
                reason: format!("number_of_ratings {number_of_ratings}: {e}"),
            })?;

        Ok(Some(StoredRecord {
            application_name,
            url,
            rating,
            number_of_ratings,
            updated_at,
        }))
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn upsert(&self, record: Record) -> Result<(), StoreError> {
        let stored = StoredRecord::from_record(&record, Utc::now());

        sqlx::query(
            "INSERT INTO channels (application_name, url, rating, number_of_ratings, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (application_name) DO UPDATE SET
                 url = EXCLUDED.url,
                 rating = EXCLUDED.rating,
                 number_of_ratings = EXCLUDED.number_of_ratings,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&stored.application_name)
        .bind(&stored.url)
        .bind(&stored.rating)
        .bind(i64::from(stored.number_of_ratings))
        .bind(stored.updated_at)
        .execute(self.db.pool())
        .await
        .map_err(|source| StoreError::Save {
            name: stored.application_name.clone(),
            source,
        })?;

        metrics::records_upserted().add(1, &[KeyValue::new("store", "postgres")]);
        debug!(application_name = %stored.application_name, "record upserted");
        Ok(())
    }
}
