//! pgmq-backed broker adapter.
//!
//! Message bodies are JSON strings holding the raw URL. Acknowledge
//! archives the message; reject either makes it visible again or moves it
//! to the dead-letter queue.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Delivery, Subscription};
use crate::db::Db;
use crate::error::{Error, Result};
use crate::model::WorkItem;

/// The queues the crawler uses.
#[derive(Debug, Clone)]
pub struct QueueNames {
    pub queue: String,
    pub dead_letter: String,
}

impl QueueNames {
    /// Install pgmq if needed and create both queues (idempotent).
    pub async fn setup(&self, db: &Db) -> Result<()> {
        db.create_extension().await?;
        db.create_queue(&self.queue).await?;
        db.create_queue(&self.dead_letter).await?;
        info!(queue = %self.queue, dead_letter = %self.dead_letter, "queues ready");
        Ok(())
    }
}

/// Subscription over one pgmq queue.
pub struct PgmqSubscription {
    db: Arc<Db>,
    names: Arc<QueueNames>,
    visibility_timeout: i32,
    poll_seconds: i32,
}

impl PgmqSubscription {
    pub fn new(db: Arc<Db>, names: QueueNames, visibility_timeout: i32, poll_seconds: i32) -> Self {
        Self {
            db,
            names: Arc::new(names),
            visibility_timeout,
            poll_seconds,
        }
    }
}

#[async_trait]
impl Subscription for PgmqSubscription {
    type Delivery = PgmqDelivery;

    async fn next_delivery(&self) -> Result<Option<PgmqDelivery>> {
        loop {
            let msg = self
                .db
                .read_with_poll(&self.names.queue, self.visibility_timeout, self.poll_seconds)
                .await?;

            if let Some(msg) = msg {
                let queued_ms = (chrono::Utc::now() - msg.enqueued_at).num_milliseconds();
                debug!(
                    msg_id = msg.msg_id,
                    read_ct = msg.read_ct,
                    queued_ms,
                    "message received"
                );
                return Ok(Some(PgmqDelivery {
                    db: Arc::clone(&self.db),
                    names: Arc::clone(&self.names),
                    msg_id: msg.msg_id,
                    payload: payload_bytes(&msg.message),
                    message: msg.message,
                }));
            }
        }
    }
}

/// A message read from pgmq, invisible to other consumers until resolved
/// or until its visibility timeout runs out.
pub struct PgmqDelivery {
    db: Arc<Db>,
    names: Arc<QueueNames>,
    msg_id: i64,
    payload: Vec<u8>,
    message: serde_json::Value,
}

#[async_trait]
impl Delivery for PgmqDelivery {
    fn id(&self) -> i64 {
        self.msg_id
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn acknowledge(self) -> Result<()> {
        self.db.archive_message(&self.names.queue, self.msg_id).await
    }

    async fn reject(self, requeue: bool) -> Result<()> {
        if requeue {
            self.db.requeue_message(&self.names.queue, self.msg_id).await
        } else {
            self.db
                .dead_letter_message(
                    &self.names.queue,
                    &self.names.dead_letter,
                    self.msg_id,
                    &self.message,
                )
                .await
        }
    }
}

/// String bodies are the raw URL; anything else passes through as JSON
/// text and fails validation downstream.
fn payload_bytes(message: &serde_json::Value) -> Vec<u8> {
    match message {
        serde_json::Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

/// Enqueues crawl requests.
pub struct CrawlScheduler {
    db: Arc<Db>,
    queue: String,
}

impl CrawlScheduler {
    pub fn new(db: Arc<Db>, queue: impl Into<String>) -> Self {
        Self {
            db,
            queue: queue.into(),
        }
    }

    /// Enqueue one URL. Returns the message ID.
    pub async fn schedule(&self, item: &WorkItem) -> Result<i64> {
        let payload = serde_json::Value::String(item.as_str().to_string());
        match self.db.send_to_queue(&self.queue, &payload, 0).await {
            Ok(msg_id) => {
                info!(url = %item, msg_id, "scheduled crawl");
                Ok(msg_id)
            }
            Err(e) => {
                warn!(url = %item, "failed to schedule crawl: {e}");
                Err(e)
            }
        }
    }

    /// Validate and enqueue URLs in order, stopping at the first failure.
    ///
    /// URLs before the failing one stay enqueued.
    pub async fn schedule_batch<S: AsRef<str>>(&self, urls: &[S]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(urls.len());
        for (index, raw) in urls.iter().enumerate() {
            let batch_err = |e: Error| Error::Batch {
                index,
                source: Box::new(e),
            };
            let item = WorkItem::new(raw.as_ref()).map_err(|e| batch_err(e.into()))?;
            ids.push(self.schedule(&item).await.map_err(batch_err)?);
        }
        Ok(ids)
    }
}
