//! # LogWriter: forwards runtime events to `tracing`
//!
//! Routine lifecycle events go out at `debug`, failures at `warn`, and
//! shutdown milestones at `info`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO  eventvisor: consumer starting consumer="orders" max_handlers=10
//! WARN  eventvisor: handler failed consumer="orders" reason="invalid field"
//! INFO  eventvisor: consumer stopped consumer="orders"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{EventKind, RuntimeEvent};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &RuntimeEvent) {
        let consumer = e.consumer.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::ConsumerStarting => {
                info!(target: "eventvisor", consumer, max_handlers = ?e.capacity, "consumer starting");
            }
            EventKind::ReceiveFailed => {
                warn!(target: "eventvisor", consumer, reason, "subscription receive failed");
            }
            EventKind::DrainStarted => {
                info!(target: "eventvisor", consumer, in_flight = ?e.in_flight, "draining handlers");
            }
            EventKind::ConsumerStopped => {
                info!(target: "eventvisor", consumer, "consumer stopped");
            }
            EventKind::ConsumerPanicked => {
                warn!(target: "eventvisor", consumer, reason, "consumer panicked");
            }
            EventKind::HandlerStarted => {
                debug!(target: "eventvisor", consumer, seq = e.seq, "handler started");
            }
            EventKind::HandlerFinished => {
                debug!(target: "eventvisor", consumer, seq = e.seq, "handler finished");
            }
            EventKind::HandlerFailed => {
                warn!(target: "eventvisor", consumer, reason, "handler failed");
            }
            EventKind::HandlerCanceled => {
                debug!(target: "eventvisor", consumer, seq = e.seq, "handler canceled");
            }
            EventKind::HandlerPanicked => {
                warn!(target: "eventvisor", consumer, reason, "handler panicked");
            }
            EventKind::ShutdownRequested => {
                info!(target: "eventvisor", "shutdown requested");
            }
            EventKind::AllStopped => {
                info!(target: "eventvisor", "all consumers stopped");
            }
            EventKind::GraceExceeded => {
                warn!(target: "eventvisor", reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "eventvisor", subscriber = consumer, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                warn!(target: "eventvisor", subscriber = consumer, reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
