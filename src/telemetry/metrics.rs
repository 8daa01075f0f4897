//! Metric instrument factories for the crawler.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"crawler"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for crawler instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("crawler")
}

/// Counter: deliveries resolved by the worker pool.
/// Labels: `outcome` ("ack" | "requeue" | "dead_letter"), `kind`
/// ("ok" or the error kind).
pub fn deliveries_resolved() -> Counter<u64> {
    meter()
        .u64_counter("crawler.deliveries.resolved")
        .with_description("Number of deliveries resolved")
        .build()
}

/// Counter: slot state transitions.
/// Labels: `from`, `to`.
pub fn slot_state_transitions() -> Counter<u64> {
    meter()
        .u64_counter("crawler.slot.state_transitions")
        .with_description("Number of worker slot state transitions")
        .build()
}

/// Counter: queue-level operations (send, read, archive, requeue, dead_letter).
/// Labels: `queue`, `operation`.
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("crawler.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: records written to the store.
/// Labels: `store`.
pub fn records_upserted() -> Counter<u64> {
    meter()
        .u64_counter("crawler.records.upserted")
        .with_description("Number of records upserted")
        .build()
}

/// Histogram: time from rate gate to resolution, in milliseconds.
/// Labels: `kind`.
pub fn item_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("crawler.item.duration_ms")
        .with_description("Per-item processing duration in milliseconds")
        .with_unit("ms")
        .build()
}
