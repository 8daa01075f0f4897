//! Worker slot: one task pulling deliveries and running them through
//! rate gate → decode → scrape → persist → resolve.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

use opentelemetry::KeyValue;

use super::rate_limit::RateLimiter;
use crate::broker::{Delivery, Outcome, Subscription};
use crate::error::Result;
use crate::model::{ValidationError, WorkItem};
use crate::scrape::{ScrapeError, Scraper};
use crate::store::{RecordStore, StoreError};
use crate::telemetry::crawl::{record_state_transition, start_delivery_span};
use crate::telemetry::metrics;

/// Where a worker slot is in its per-delivery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    AwaitingRateGate,
    Decoding,
    Scraping,
    Persisting,
    Resolving,
    Closed,
}

impl SlotState {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotState::Idle => "idle",
            SlotState::AwaitingRateGate => "awaiting_rate_gate",
            SlotState::Decoding => "decoding",
            SlotState::Scraping => "scraping",
            SlotState::Persisting => "persisting",
            SlotState::Resolving => "resolving",
            SlotState::Closed => "closed",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a delivery was not processed to completion.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("malformed payload: {0}")]
    Validation(#[from] ValidationError),

    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("persist failed: {0}")]
    Store(#[from] StoreError),

    /// Shutdown arrived before the item passed the rate gate.
    #[error("cancelled before processing")]
    Cancelled,
}

impl ItemError {
    pub fn kind(&self) -> &'static str {
        match self {
            ItemError::Validation(_) => "validation_error",
            ItemError::Scrape(e) => e.kind(),
            ItemError::Store(_) => "store_error",
            ItemError::Cancelled => "cancelled",
        }
    }
}

/// Map a pipeline result onto broker semantics.
///
/// Malformed payloads will never succeed, so they are dead-lettered.
/// Scrape and store failures are dead-lettered too rather than retried
/// in-process: most are timeouts that will not clear immediately. An item
/// interrupted before it started goes back on the queue untouched.
pub fn classify(result: &std::result::Result<(), ItemError>) -> Outcome {
    match result {
        Ok(()) => Outcome::Ack,
        Err(ItemError::Validation(_) | ItemError::Scrape(_) | ItemError::Store(_)) => {
            Outcome::Reject { requeue: false }
        }
        Err(ItemError::Cancelled) => Outcome::Reject { requeue: true },
    }
}

/// Remaining time in-flight items get once cancellation fires.
///
/// The budget starts when the first in-flight item observes cancellation;
/// every item deadline is capped by it.
pub(crate) struct DrainBudget {
    token: CancellationToken,
    grace: Duration,
    deadline: OnceLock<Instant>,
}

impl DrainBudget {
    pub(crate) fn new(token: CancellationToken, grace: Duration) -> Self {
        Self {
            token,
            grace,
            deadline: OnceLock::new(),
        }
    }

    /// Completes once the drain budget is used up.
    async fn expired(&self) {
        self.token.cancelled().await;
        let deadline = *self.deadline.get_or_init(|| Instant::now() + self.grace);
        tokio::time::sleep_until(deadline).await;
    }
}

/// Records slot state changes on the delivery span.
struct StateTracker<'a> {
    span: &'a Span,
    state: SlotState,
}

impl StateTracker<'_> {
    fn advance(&mut self, to: SlotState) {
        record_state_transition(self.span, self.state.as_str(), to.as_str());
        self.state = to;
    }
}

/// One worker slot.
pub(crate) struct Worker {
    pub(crate) slot: usize,
    pub(crate) scraper: Arc<dyn Scraper>,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) drain: Arc<DrainBudget>,
    pub(crate) token: CancellationToken,
    pub(crate) scrape_timeout: Duration,
    pub(crate) error_backoff: Duration,
}

impl Worker {
    /// Pull deliveries until the stream closes or the scope is cancelled.
    ///
    /// A delivery already taken is always resolved before the slot exits.
    pub(crate) async fn run<S: Subscription>(self, subscription: Arc<S>) -> Result<()> {
        info!(slot = self.slot, "worker slot started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                next = subscription.next_delivery() => next,
            };

            let delivery = match next {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    info!(slot = self.slot, "delivery stream closed");
                    break;
                }
                Err(e) if e.is_connection_loss() => {
                    error!(slot = self.slot, "broker connection lost: {e}");
                    self.token.cancel();
                    return Err(e);
                }
                Err(e) => {
                    warn!(slot = self.slot, "failed to receive delivery: {e}");
                    tokio::select! {
                        _ = self.token.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => continue,
                    }
                }
            };

            self.handle(delivery).await;
        }

        info!(slot = self.slot, state = %SlotState::Closed, "worker slot closed");
        Ok(())
    }

    async fn handle<D: Delivery>(&self, delivery: D) {
        let span = start_delivery_span(self.slot, delivery.id());

        async {
            let started = Instant::now();
            let mut tracker = StateTracker {
                span: &span,
                state: SlotState::Idle,
            };

            let result = self.process(&delivery, &mut tracker).await;
            tracker.advance(SlotState::Resolving);

            let outcome = classify(&result);
            let kind = match &result {
                Ok(()) => "ok",
                Err(e) => e.kind(),
            };
            let elapsed = started.elapsed();
            let elapsed_ms = elapsed.as_millis() as u64;

            match &result {
                Ok(()) => info!(kind, %outcome, elapsed_ms, "delivery processed"),
                Err(e) => warn!(kind, %outcome, elapsed_ms, error = %e, "delivery failed"),
            }

            if let Err(e) = delivery.resolve(outcome).await {
                error!(%outcome, "failed to resolve delivery: {e}");
            }

            metrics::deliveries_resolved().add(
                1,
                &[
                    KeyValue::new("outcome", outcome.to_string()),
                    KeyValue::new("kind", kind),
                ],
            );
            metrics::item_duration_ms()
                .record(elapsed.as_secs_f64() * 1000.0, &[KeyValue::new("kind", kind)]);

            tracker.advance(SlotState::Idle);
        }
        .instrument(span.clone())
        .await
    }

    async fn process<D: Delivery>(
        &self,
        delivery: &D,
        tracker: &mut StateTracker<'_>,
    ) -> std::result::Result<(), ItemError> {
        tracker.advance(SlotState::AwaitingRateGate);
        tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(ItemError::Cancelled),
            _ = self.limiter.acquire() => {}
        }

        tracker.advance(SlotState::Decoding);
        let item = WorkItem::from_payload(delivery.payload())?;
        tracker.span.record("crawl.url", item.as_str());

        tracker.advance(SlotState::Scraping);
        let deadline = Instant::now() + self.scrape_timeout;
        // The scrape runs as its own task: giving up on it below only
        // detaches it, so it still reaches its own deadline and releases
        // the page it opened.
        let scrape = {
            let scraper = Arc::clone(&self.scraper);
            let item = item.clone();
            tokio::spawn(async move { scraper.scrape(&item, deadline).await })
        };
        let record = match self.bounded(deadline, scrape).await {
            Some(Ok(result)) => result?,
            Some(Err(e)) => {
                return Err(ScrapeError::Driver(format!("scrape task failed: {e}")).into());
            }
            None => return Err(ScrapeError::Timeout.into()),
        };

        tracker.advance(SlotState::Persisting);
        self.bounded(deadline, self.store.upsert(record))
            .await
            .unwrap_or(Err(StoreError::Timeout))?;

        Ok(())
    }

    /// Run `fut` until it finishes, the item deadline passes, or the drain
    /// budget runs out, whichever comes first. `fut` is dropped on expiry.
    async fn bounded<F: Future>(&self, deadline: Instant, fut: F) -> Option<F::Output> {
        tokio::select! {
            out = fut => Some(out),
            _ = tokio::time::sleep_until(deadline) => None,
            _ = self.drain.expired() => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_acks() {
        assert_eq!(classify(&Ok(())), Outcome::Ack);
    }

    #[test]
    fn malformed_payload_is_dead_lettered() {
        let result = Err(ItemError::Validation(ValidationError::EmptyUrl));
        assert_eq!(classify(&result), Outcome::Reject { requeue: false });
    }

    #[test]
    fn every_scrape_failure_is_dead_lettered() {
        let failures = [
            ScrapeError::Timeout,
            ScrapeError::Evaluation {
                line: Some(3),
                message: "boom".to_string(),
            },
            ScrapeError::NotFound {
                selector: ".x".to_string(),
            },
            ScrapeError::InvalidData {
                field: "rating",
                reason: "bad".to_string(),
            },
            ScrapeError::Driver("gone".to_string()),
        ];
        for failure in failures {
            let result = Err(ItemError::Scrape(failure));
            assert_eq!(classify(&result), Outcome::Reject { requeue: false });
        }
    }

    #[test]
    fn store_failure_is_dead_lettered() {
        let result = Err(ItemError::Store(StoreError::Timeout));
        assert_eq!(classify(&result), Outcome::Reject { requeue: false });
    }

    #[test]
    fn cancelled_before_start_is_requeued() {
        assert_eq!(
            classify(&Err(ItemError::Cancelled)),
            Outcome::Reject { requeue: true }
        );
    }

    #[test]
    fn error_kinds() {
        assert_eq!(ItemError::Cancelled.kind(), "cancelled");
        assert_eq!(ItemError::Scrape(ScrapeError::Timeout).kind(), "timeout");
        assert_eq!(ItemError::Store(StoreError::Timeout).kind(), "store_error");
    }
}
