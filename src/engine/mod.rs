//! Crawl engine: queue consumer, shared rate gate, worker slots.

pub mod consumer;
pub mod rate_limit;
pub mod worker;

pub use consumer::{ConsumerConfig, QueueConsumer};
pub use rate_limit::RateLimiter;
pub use worker::{ItemError, SlotState, classify};
