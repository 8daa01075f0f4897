//! Delivery processing span helpers.
//!
//! Provides span creation and state-transition recording for deliveries
//! flowing through a worker slot.

use opentelemetry::KeyValue;
use tracing::Span;

use super::metrics;

/// Start a span for processing one delivery.
///
/// The `crawl.url` and `crawl.state` fields are declared empty and filled
/// as the slot learns them.
pub fn start_delivery_span(slot: usize, msg_id: i64) -> Span {
    tracing::info_span!(
        "crawl.delivery",
        "crawl.slot" = slot,
        "crawl.msg_id" = msg_id,
        "crawl.url" = tracing::field::Empty,
        "crawl.state" = tracing::field::Empty,
    )
}

/// Record a slot state transition on the given span.
///
/// Emits a tracing `info` event scoped to the span and bumps the
/// transition counter.
pub fn record_state_transition(span: &Span, from: &str, to: &str) {
    span.record("crawl.state", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
    metrics::slot_state_transitions().add(
        1,
        &[
            KeyValue::new("from", from.to_string()),
            KeyValue::new("to", to.to_string()),
        ],
    );
}
