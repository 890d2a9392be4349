//! # Non-blocking event fan-out to multiple subscribers.
//!
//! ```text
//! emit_arc(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_event()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit_arc()` returns immediately (uses `try_send`)
//! - **Per-subscriber FIFO**; no ordering across subscribers
//! - **Overflow**: event dropped for that subscriber only, `SubscriberOverflow` published
//! - **Isolation**: a panicking subscriber is reported and keeps running

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::subscribers::Subscribe;

/// Queue feeding one subscriber, plus the task draining it.
struct Worker {
    name: &'static str,
    queue: mpsc::Sender<Arc<RuntimeEvent>>,
    task: JoinHandle<()>,
}

impl Worker {
    fn spawn(sub: Arc<dyn Subscribe>, bus: Bus) -> Self {
        let name = sub.name();
        let (queue, mut rx) = mpsc::channel::<Arc<RuntimeEvent>>(sub.queue_capacity().max(1));
        let task = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let delivered = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await;
                if let Err(payload) = delivered {
                    bus.publish(RuntimeEvent::subscriber_panicked(
                        name,
                        panic_message(payload.as_ref()),
                    ));
                }
            }
        });
        Self { name, queue, task }
    }
}

/// Fan-out coordinator for runtime event subscribers.
pub struct SubscriberSet {
    workers: Vec<Worker>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let workers = subs
            .into_iter()
            .map(|sub| Worker::spawn(sub, bus.clone()))
            .collect();
        Self { workers, bus }
    }

    /// Queues `event` for every subscriber without waiting.
    ///
    /// A dropped overflow event is not reported again.
    pub fn emit_arc(&self, event: Arc<RuntimeEvent>) {
        let report = event.kind != EventKind::SubscriberOverflow;
        for worker in &self.workers {
            let reason = match worker.queue.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report {
                self.bus
                    .publish(RuntimeEvent::subscriber_overflow(worker.name, reason));
            }
        }
    }

    /// Closes every queue and waits until each worker drained it.
    pub async fn shutdown(self) {
        let mut tasks = Vec::with_capacity(self.workers.len());
        for Worker { queue, task, .. } in self.workers {
            drop(queue);
            tasks.push(task);
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    match payload.downcast_ref::<&'static str>() {
        Some(msg) => (*msg).to_string(),
        None => payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}
