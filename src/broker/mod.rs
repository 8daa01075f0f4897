//! Broker boundary: deliveries in, acknowledgments out.
//!
//! The worker pipeline decides an [`Outcome`] per delivery; only the
//! broker adapter turns it into an acknowledge or reject call. Resolution
//! consumes the delivery, so it can happen at most once.

pub mod pgmq;

use async_trait::async_trait;
use std::fmt;

use crate::error::Result;

pub use pgmq::{CrawlScheduler, PgmqDelivery, PgmqSubscription, QueueNames};

/// How a delivery is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    /// `requeue: false` routes the message to the dead-letter path.
    Reject { requeue: bool },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ack => f.write_str("ack"),
            Outcome::Reject { requeue: true } => f.write_str("requeue"),
            Outcome::Reject { requeue: false } => f.write_str("dead_letter"),
        }
    }
}

/// One inbound message with a pending acknowledgment obligation.
#[async_trait]
pub trait Delivery: Send + Sync + Sized + 'static {
    /// Broker-assigned identifier, for logs.
    fn id(&self) -> i64;

    fn payload(&self) -> &[u8];

    async fn acknowledge(self) -> Result<()>;

    async fn reject(self, requeue: bool) -> Result<()>;

    /// Apply a pipeline outcome.
    async fn resolve(self, outcome: Outcome) -> Result<()> {
        match outcome {
            Outcome::Ack => self.acknowledge().await,
            Outcome::Reject { requeue } => self.reject(requeue).await,
        }
    }
}

/// An open subscription that worker slots compete on.
///
/// The broker hands each message to one caller at a time.
#[async_trait]
pub trait Subscription: Send + Sync + 'static {
    type Delivery: Delivery;

    /// Wait for the next delivery. `Ok(None)` means the stream has closed.
    async fn next_delivery(&self) -> Result<Option<Self::Delivery>>;
}
