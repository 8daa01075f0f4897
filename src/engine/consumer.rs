//! Queue consumer: fans one subscription out to a fixed pool of worker slots.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::rate_limit::RateLimiter;
use super::worker::{DrainBudget, Worker};
use crate::broker::Subscription;
use crate::error::{Error, Result};
use crate::scrape::Scraper;
use crate::store::RecordStore;

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Number of worker slots, and so the maximum number of deliveries in
    /// flight at once.
    pub workers: usize,
    /// Minimum spacing between scrape starts across the whole pool.
    pub rate_limit: Duration,
    /// Per-item deadline covering scrape and persist.
    pub scrape_timeout: Duration,
    /// How long in-flight items may keep running after cancellation.
    pub shutdown_grace: Duration,
    /// Pause after a non-fatal receive error.
    pub error_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            rate_limit: Duration::from_millis(200),
            scrape_timeout: Duration::from_secs(20),
            shutdown_grace: Duration::from_secs(10),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Consumes deliveries from a subscription with a bounded worker pool.
pub struct QueueConsumer<S: Subscription> {
    subscription: Arc<S>,
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn RecordStore>,
    config: ConsumerConfig,
    token: CancellationToken,
}

impl<S: Subscription> QueueConsumer<S> {
    pub fn new(
        subscription: S,
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn RecordStore>,
        config: ConsumerConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            subscription: Arc::new(subscription),
            scraper,
            store,
            config,
            token,
        }
    }

    /// Run every worker slot until the token is cancelled or the
    /// subscription ends. Returns once all slots have exited.
    pub async fn run(self) -> Result<()> {
        if self.config.workers == 0 {
            return Err(Error::Config("worker pool needs at least one slot".into()));
        }

        let limiter = Arc::new(RateLimiter::new(self.config.rate_limit));
        let drain = Arc::new(DrainBudget::new(
            self.token.clone(),
            self.config.shutdown_grace,
        ));

        info!(
            workers = self.config.workers,
            rate_limit_ms = self.config.rate_limit.as_millis() as u64,
            "starting worker pool"
        );

        let mut slots = JoinSet::new();
        for slot in 0..self.config.workers {
            let worker = Worker {
                slot,
                scraper: Arc::clone(&self.scraper),
                store: Arc::clone(&self.store),
                limiter: Arc::clone(&limiter),
                drain: Arc::clone(&drain),
                token: self.token.clone(),
                scrape_timeout: self.config.scrape_timeout,
                error_backoff: self.config.error_backoff,
            };
            slots.spawn(worker.run(Arc::clone(&self.subscription)));
        }

        let mut first_err = None;
        while let Some(joined) = slots.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => {
                    error!("worker slot panicked: {e}");
                    self.token.cancel();
                    Error::Other(format!("worker slot panicked: {e}"))
                }
            };
            first_err.get_or_insert(err);
        }

        info!("worker pool stopped");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
