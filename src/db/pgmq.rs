//! pgmq queue operations via direct SQLx.
//!
//! Calls pgmq's SQL functions: pgmq.create, pgmq.send, pgmq.read_with_poll,
//! pgmq.archive, pgmq.delete, pgmq.set_vt. The broker database may be a
//! fresh one, so the extension itself is created here too.

use crate::error::Result;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;

/// A message read from a pgmq queue.
#[derive(Debug, Clone)]
pub struct PgmqMessage {
    pub msg_id: i64,
    pub read_ct: i32,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
    pub message: serde_json::Value,
}

fn count(queue_name: &str, operation: &'static str) {
    metrics::queue_operations().add(
        1,
        &[
            KeyValue::new("queue", queue_name.to_string()),
            KeyValue::new("operation", operation),
        ],
    );
}

impl super::Db {
    /// Install the pgmq extension if this database lacks it (idempotent).
    pub async fn create_extension(&self) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS pgmq")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Create a pgmq queue (idempotent). Needs the extension.
    pub async fn create_queue(&self, queue_name: &str) -> Result<()> {
        sqlx::query("SELECT pgmq.create($1)")
            .bind(queue_name)
            .execute(&self.pool)
            .await?;
        count(queue_name, "create");
        Ok(())
    }

    /// Send a message to a pgmq queue. Returns the message ID.
    /// delay_seconds: 0 for immediate, >0 for delayed delivery.
    pub async fn send_to_queue(
        &self,
        queue_name: &str,
        payload: &serde_json::Value,
        delay_seconds: i32,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT pgmq.send($1, $2, $3)")
            .bind(queue_name)
            .bind(payload)
            .bind(delay_seconds)
            .fetch_one(&self.pool)
            .await?;
        count(queue_name, "send");
        Ok(row.0)
    }

    /// Read the next message, waiting server-side up to `poll_seconds` for
    /// one to arrive. The message stays invisible for `vt_seconds`.
    /// Returns None if nothing arrived.
    pub async fn read_with_poll(
        &self,
        queue_name: &str,
        vt_seconds: i32,
        poll_seconds: i32,
    ) -> Result<Option<PgmqMessage>> {
        let row = sqlx::query_as::<
            _,
            (i64, i32, chrono::DateTime<chrono::Utc>, serde_json::Value),
        >(
            "SELECT msg_id, read_ct, enqueued_at, message FROM pgmq.read_with_poll($1, $2, 1, $3, 100)",
        )
        .bind(queue_name)
        .bind(vt_seconds)
        .bind(poll_seconds)
        .fetch_optional(&self.pool)
        .await?;

        let msg = row.map(|(msg_id, read_ct, enqueued_at, message)| PgmqMessage {
            msg_id,
            read_ct,
            enqueued_at,
            message,
        });

        count(queue_name, if msg.is_some() { "read" } else { "read_empty" });

        Ok(msg)
    }

    /// Archive a message (moves to archive table, preserves for audit).
    pub async fn archive_message(&self, queue_name: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.archive($1, $2)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await?;
        count(queue_name, "archive");
        Ok(())
    }

    /// Make a message visible again right away.
    pub async fn requeue_message(&self, queue_name: &str, msg_id: i64) -> Result<()> {
        sqlx::query("SELECT pgmq.set_vt($1, $2, 0)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&self.pool)
            .await?;
        count(queue_name, "requeue");
        Ok(())
    }

    /// Move a message to `dead_letter_queue` and drop it from `queue_name`,
    /// atomically.
    pub async fn dead_letter_message(
        &self,
        queue_name: &str,
        dead_letter_queue: &str,
        msg_id: i64,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pgmq.send($1, $2, 0)")
            .bind(dead_letter_queue)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        sqlx::query("SELECT pgmq.delete($1, $2)")
            .bind(queue_name)
            .bind(msg_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        count(queue_name, "dead_letter");
        Ok(())
    }
}
