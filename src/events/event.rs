//! # Runtime events emitted by the server, consumers and handler tasks.
//!
//! [`EventKind`] classifies events in three groups:
//! - **Consumer lifecycle**: starting, receive failure, drain, stopped, panicked
//! - **Handler lifecycle**: started, finished, failed, canceled, panicked
//! - **Server lifecycle**: shutdown requested, all stopped, grace exceeded
//!
//! Each [`RuntimeEvent`] carries a globally unique, monotonically increasing
//! `seq`; use it to restore order when events are observed out of order.
//!
//! ## Example
//! ```rust
//! use eventvisor::events::{EventKind, RuntimeEvent};
//!
//! let ev = RuntimeEvent::new(EventKind::ReceiveFailed)
//!     .with_consumer("orders")
//!     .with_reason("subscription closed");
//!
//! assert_eq!(ev.consumer.as_deref(), Some("orders"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Consumer lifecycle ===
    /// Consumer entered its receive loop.
    ///
    /// Sets: `consumer`, `capacity` (= max handlers)
    ConsumerStarting,

    /// Subscription receive failed; the consumer stops pulling.
    ///
    /// Sets: `consumer`, `reason`
    ReceiveFailed,

    /// Consumer left its receive loop and waits for in-flight handlers.
    ///
    /// Sets: `consumer`, `in_flight` (handlers still running)
    DrainStarted,

    /// Consumer drained all handlers and returned.
    ///
    /// Sets: `consumer`
    ConsumerStopped,

    /// Consumer task died without draining; reported by the server.
    ///
    /// Sets: `consumer`, `reason`
    ConsumerPanicked,

    // === Handler lifecycle ===
    /// Handler invocation admitted and spawned.
    ///
    /// Sets: `consumer`
    HandlerStarted,

    /// Handler returned `Ok`.
    ///
    /// Sets: `consumer`
    HandlerFinished,

    /// Handler returned an error.
    ///
    /// Sets: `consumer`, `reason`
    HandlerFailed,

    /// Handler gave up after observing cancellation.
    ///
    /// Sets: `consumer`
    HandlerCanceled,

    /// Handler panicked; the panic was contained.
    ///
    /// Sets: `consumer`, `reason`
    HandlerPanicked,

    // === Server lifecycle ===
    /// Root token cancelled (close() or OS signal).
    ShutdownRequested,

    /// Every consumer drained.
    AllStopped,

    /// Drain exceeded the configured grace period.
    GraceExceeded,

    // === Subscriber workers ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `consumer` (subscriber name), `reason`
    SubscriberOverflow,

    /// Subscriber panicked while processing an event.
    ///
    /// Sets: `consumer` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Debug, Clone)]
pub struct RuntimeEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Consumer (or subscriber) name, if applicable.
    pub consumer: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Handlers still running when the event was published.
    pub in_flight: Option<u32>,
    /// Handler cap of the consumer.
    pub capacity: Option<u32>,
}

impl RuntimeEvent {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            consumer: None,
            reason: None,
            in_flight: None,
            capacity: None,
        }
    }

    #[inline]
    pub fn with_consumer(mut self, name: impl Into<Arc<str>>) -> Self {
        self.consumer = Some(name.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_in_flight(mut self, n: usize) -> Self {
        self.in_flight = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    #[inline]
    pub fn with_capacity(mut self, n: usize) -> Self {
        self.capacity = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        RuntimeEvent::new(EventKind::SubscriberOverflow)
            .with_consumer(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        RuntimeEvent::new(EventKind::SubscriberPanicked)
            .with_consumer(subscriber)
            .with_reason(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = RuntimeEvent::new(EventKind::HandlerStarted);
        let b = RuntimeEvent::new(EventKind::HandlerFinished);
        assert!(b.seq > a.seq);
    }
}
