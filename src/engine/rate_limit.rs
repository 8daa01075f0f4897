//! Shared rate gate bounding how fast the whole pool starts scrapes.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Fixed-cadence gate shared by every worker slot.
///
/// Each [`acquire`](RateLimiter::acquire) consumes one tick. Waiters line
/// up behind the ticker in arrival order. Ticks nobody was waiting for are
/// dropped, so an idle period never builds up a burst.
pub struct RateLimiter {
    ticker: Mutex<Interval>,
}

impl RateLimiter {
    pub fn new(period: Duration) -> Self {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            ticker: Mutex::new(ticker),
        }
    }

    /// Wait for the next permitted instant. Returns that instant.
    ///
    /// Not bounded by any deadline; drop the future to stop waiting.
    pub async fn acquire(&self) -> Instant {
        self.ticker.lock().await.tick().await
    }
}
