//! Bridges the lifecycle [`Bus`] to a [`SubscriberSet`].

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::Bus;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Forwards bus events to the subscriber set until stopped.
pub(super) struct Listener {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    /// Subscribes synchronously so no event published after this call is missed.
    pub(super) fn spawn(bus: &Bus, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut rx = bus.subscribe();
        let bus = bus.clone();
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let handle = tokio::spawn(async move {
            let set = SubscriberSet::new(subscribers, bus);
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = stopped.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit_arc(Arc::new(ev)),
                                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            set.shutdown().await;
        });
        Self { stop, handle }
    }

    /// Flushes queued events to subscribers and waits for their workers.
    pub(super) async fn stop(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
