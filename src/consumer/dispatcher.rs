//! # Consumer: bounded dispatcher for one subscription.
//!
//! Pulls messages one at a time and runs each on its own tokio task, holding
//! one semaphore permit per in-flight handler.
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► receive(token)          ── error/panic ──► cancel token, break
//!   │       └─ token cancelled  ──────────► break
//!   ├─► acquire_owned permit    ── token cancelled ──► break (message dropped)
//!   ├─► publish HandlerStarted
//!   └─► spawn { handler.handle(Request) ; drop(permit) }
//!                 ├─► Ok      → HandlerFinished
//!                 ├─► Canceled → HandlerCanceled
//!                 ├─► Err     → HandlerFailed
//!                 └─► panic   → HandlerPanicked
//! }
//! drain: acquire_many(max_handlers)  ──► subscription.shutdown() ──► ConsumerStopped
//! ```
//!
//! ## Rules
//! - At most `max_handlers` handlers run concurrently for one consumer
//! - Dispatch follows the order the subscription yields messages; completion is unordered
//! - `serve` returns only after every admitted handler finished
//! - A receive error is terminal: no retry, no reconnection
//! - The dispatcher never acknowledges messages
//! - Handlers get no timeout; a hung handler stalls the drain

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{select, sync::Semaphore};
use tokio_util::sync::CancellationToken;

use super::handler::{HandlerRef, Request};
use super::listener::Listener;
use super::subscription::SubscriptionRef;
use crate::config::Config;
use crate::error::HandlerError;
use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::subscribers::{panic_message, LogWriter, Subscribe};

/// Bounded dispatcher binding a subscription to a handler.
#[derive(Clone)]
pub struct Consumer {
    name: Arc<str>,
    subscription: SubscriptionRef,
    handler: HandlerRef,
    max_handlers: usize,
}

impl Consumer {
    /// Creates a consumer; `max_handlers` is clamped to at least 1.
    pub fn new(
        name: impl Into<Arc<str>>,
        subscription: SubscriptionRef,
        handler: HandlerRef,
        max_handlers: usize,
    ) -> Self {
        Self {
            name: name.into(),
            subscription,
            handler,
            max_handlers: max_handlers.clamp(1, u32::MAX as usize),
        }
    }

    /// Creates a consumer using the handler cap from `cfg`.
    pub fn with_defaults(
        name: impl Into<Arc<str>>,
        subscription: SubscriptionRef,
        handler: HandlerRef,
        cfg: &Config,
    ) -> Self {
        Self::new(name, subscription, handler, cfg.max_handlers_clamped())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_handlers(&self) -> usize {
        self.max_handlers
    }

    /// Runs the dispatch loop until the subscription fails or `token` is cancelled.
    ///
    /// Lifecycle events are logged through a [`LogWriter`]; use
    /// [`Consumer::serve_observed`] or [`Consumer::serve_with`] to observe them.
    pub async fn serve(&self, token: CancellationToken) {
        self.serve_observed(token, vec![Arc::new(LogWriter::new())]).await;
    }

    /// Runs the dispatch loop on a private bus forwarding to `subscribers`.
    ///
    /// Returns after every queued event reached the subscribers.
    pub async fn serve_observed(&self, token: CancellationToken, subscribers: Vec<Arc<dyn Subscribe>>) {
        let bus = Bus::default();
        let listener = Listener::spawn(&bus, subscribers);
        self.serve_with(token, &bus).await;
        listener.stop().await;
    }

    /// Runs the dispatch loop, publishing lifecycle events to `bus`.
    ///
    /// A receive failure cancels a token scoped to this call, so in-flight
    /// handlers observe it while the caller's token stays untouched.
    pub async fn serve_with(&self, token: CancellationToken, bus: &Bus) {
        let token = token.child_token();
        let slots = Arc::new(Semaphore::new(self.max_handlers));

        bus.publish(
            RuntimeEvent::new(EventKind::ConsumerStarting)
                .with_consumer(Arc::clone(&self.name))
                .with_capacity(self.max_handlers),
        );

        loop {
            let message = select! {
                biased;
                _ = token.cancelled() => break,
                res = AssertUnwindSafe(self.subscription.receive(&token)).catch_unwind() => match res {
                    Ok(Ok(message)) => message,
                    Ok(Err(e)) => {
                        self.stop_receiving(&token, bus, e.to_string());
                        break;
                    }
                    Err(panic) => {
                        let reason = format!("receive panicked: {}", panic_message(panic.as_ref()));
                        self.stop_receiving(&token, bus, reason);
                        break;
                    }
                },
            };

            let permit = select! {
                biased;
                _ = token.cancelled() => break,
                res = Arc::clone(&slots).acquire_owned() => match res {
                    Ok(permit) => permit,
                    Err(_closed) => break,
                },
            };

            bus.publish(
                RuntimeEvent::new(EventKind::HandlerStarted).with_consumer(Arc::clone(&self.name)),
            );
            let req = Request::new(token.child_token(), message);
            let handler = Arc::clone(&self.handler);
            let name = Arc::clone(&self.name);
            let bus = bus.clone();

            tokio::spawn(async move {
                let _permit = permit;
                // `handle` itself may panic before returning a future.
                let outcome = AssertUnwindSafe(async move { handler.handle(req).await })
                    .catch_unwind()
                    .await;
                let ev = match outcome {
                    Ok(Ok(())) => RuntimeEvent::new(EventKind::HandlerFinished),
                    Ok(Err(HandlerError::Canceled)) => RuntimeEvent::new(EventKind::HandlerCanceled),
                    Ok(Err(e)) => RuntimeEvent::new(EventKind::HandlerFailed).with_reason(e.to_string()),
                    Err(panic) => RuntimeEvent::new(EventKind::HandlerPanicked)
                        .with_reason(panic_message(panic.as_ref())),
                };
                bus.publish(ev.with_consumer(name));
            });
        }

        self.drain(&slots, bus).await;
        self.subscription.shutdown().await;
        bus.publish(RuntimeEvent::new(EventKind::ConsumerStopped).with_consumer(Arc::clone(&self.name)));
    }

    fn stop_receiving(&self, token: &CancellationToken, bus: &Bus, reason: String) {
        bus.publish(
            RuntimeEvent::new(EventKind::ReceiveFailed)
                .with_consumer(Arc::clone(&self.name))
                .with_reason(reason),
        );
        token.cancel();
    }

    /// Reclaims every slot, i.e. waits for all in-flight handlers.
    async fn drain(&self, slots: &Semaphore, bus: &Bus) {
        let in_flight = self.max_handlers - slots.available_permits();
        bus.publish(
            RuntimeEvent::new(EventKind::DrainStarted)
                .with_consumer(Arc::clone(&self.name))
                .with_in_flight(in_flight),
        );
        // `slots` is never closed.
        let _all = slots.acquire_many(self.max_handlers as u32).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::{BoxHandlerFuture, ChannelSubscription, Handler, HandlerFn, Message, Subscription};
    use crate::error::{ErrorKind, SubscriptionError};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn msg(i: usize) -> Message {
        Message::new(i.to_string(), format!("payload-{i}").into_bytes())
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_max_handlers() {
        let (tx, sub) = ChannelSubscription::new(64);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let handler = {
            let (current, peak, done) = (current.clone(), peak.clone(), done.clone());
            HandlerFn::arc(move |req: Request| {
                let (current, peak, done) = (current.clone(), peak.clone(), done.clone());
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    done.fetch_add(1, Ordering::SeqCst);
                    req.message.ack();
                    Ok(())
                }
            })
        };

        let consumer = Consumer::new("bounded", Arc::new(sub), handler, 3);
        for i in 0..40 {
            tx.send(msg(i)).await.unwrap();
        }
        drop(tx);

        consumer.serve(CancellationToken::new()).await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
        assert_eq!(done.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn cancel_waits_for_admitted_handlers() {
        let (tx, sub) = ChannelSubscription::new(4);
        let started = Arc::new(Notify::new());
        let finished = Arc::new(AtomicBool::new(false));

        let handler = {
            let (started, finished) = (started.clone(), finished.clone());
            HandlerFn::arc(move |_req: Request| {
                let (started, finished) = (started.clone(), finished.clone());
                async move {
                    started.notify_one();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        let consumer = Consumer::new("drain", Arc::new(sub), handler, 2);
        let token = CancellationToken::new();
        tx.send(msg(1)).await.unwrap();

        let serve = tokio::spawn({
            let token = token.clone();
            async move { consumer.serve(token).await }
        });

        started.notified().await;
        token.cancel();
        serve.await.unwrap();

        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn third_message_waits_for_a_free_slot() {
        let (tx, sub) = ChannelSubscription::new(4);
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(tokio::sync::Semaphore::new(0));

        let handler = {
            let (started, release) = (started.clone(), release.clone());
            HandlerFn::arc(move |_req: Request| {
                let (started, release) = (started.clone(), release.clone());
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    if let Ok(go) = release.acquire().await {
                        go.forget();
                    }
                    Ok(())
                }
            })
        };

        let consumer = Consumer::new("pair", Arc::new(sub), handler, 2);
        for i in 0..3 {
            tx.send(msg(i)).await.unwrap();
        }
        drop(tx);
        let serve = tokio::spawn(async move { consumer.serve(CancellationToken::new()).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);

        release.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);

        release.add_permits(2);
        serve.await.unwrap();
    }

    #[tokio::test]
    async fn receive_error_stops_and_cancels_in_flight_handlers() {
        let (tx, sub) = ChannelSubscription::new(4);
        let observed_cancel = Arc::new(AtomicBool::new(false));

        let handler = {
            let observed_cancel = observed_cancel.clone();
            HandlerFn::arc(move |req: Request| {
                let observed_cancel = observed_cancel.clone();
                async move {
                    req.token.cancelled().await;
                    observed_cancel.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        let consumer = Consumer::new("closing", Arc::new(sub), handler, 1);
        let outer = CancellationToken::new();
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        tx.send(msg(1)).await.unwrap();
        drop(tx);
        consumer.serve_with(outer.clone(), &bus).await;

        assert!(observed_cancel.load(Ordering::SeqCst));
        assert!(!outer.is_cancelled());

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(kinds.first(), Some(&EventKind::ConsumerStarting));
        assert!(kinds.contains(&EventKind::ReceiveFailed));
        assert_eq!(kinds.last(), Some(&EventKind::ConsumerStopped));
    }

    #[tokio::test]
    async fn handler_errors_and_panics_are_contained() {
        let (tx, sub) = ChannelSubscription::new(4);
        let handler = HandlerFn::arc(|req: Request| async move {
            match req.message.id() {
                "fail" => Err(HandlerError::new(ErrorKind::InvalidField, "bad payload")),
                "panic" => panic!("handler exploded"),
                _ => Ok(()),
            }
        });

        let consumer = Consumer::new("faulty", Arc::new(sub), handler, 2);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        tx.send(Message::new("fail", Vec::new())).await.unwrap();
        tx.send(Message::new("panic", Vec::new())).await.unwrap();
        tx.send(Message::new("ok", Vec::new())).await.unwrap();
        drop(tx);
        consumer.serve_with(CancellationToken::new(), &bus).await;

        let mut failed = 0;
        let mut panicked = None;
        let mut finished = 0;
        while let Ok(ev) = rx.try_recv() {
            match ev.kind {
                EventKind::HandlerFailed => failed += 1,
                EventKind::HandlerPanicked => panicked = ev.reason.clone(),
                EventKind::HandlerFinished => finished += 1,
                _ => {}
            }
        }
        assert_eq!(failed, 1);
        assert_eq!(panicked.as_deref(), Some("handler exploded"));
        assert_eq!(finished, 1);
    }

    struct Refusing {
        finished: Arc<AtomicBool>,
    }

    impl Handler for Refusing {
        fn handle(&self, req: Request) -> BoxHandlerFuture {
            if req.message.id() == "boom" {
                panic!("no future for boom");
            }
            let finished = self.finished.clone();
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.store(true, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn panic_while_building_the_future_still_drains() {
        let (tx, sub) = ChannelSubscription::new(4);
        let finished = Arc::new(AtomicBool::new(false));
        let handler = Arc::new(Refusing {
            finished: finished.clone(),
        });

        let consumer = Consumer::new("refusing", Arc::new(sub), handler, 2);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        tx.send(Message::new("slow", Vec::new())).await.unwrap();
        tx.send(Message::new("boom", Vec::new())).await.unwrap();
        let token = CancellationToken::new();
        let serve = tokio::spawn({
            let token = token.clone();
            async move { consumer.serve_with(token, &bus).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        serve.await.unwrap();
        assert!(finished.load(Ordering::SeqCst));

        let mut panicked = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::HandlerPanicked {
                panicked = ev.reason.clone();
            }
        }
        assert_eq!(panicked.as_deref(), Some("no future for boom"));
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl Subscription for Exploding {
        async fn receive(&self, _token: &CancellationToken) -> Result<Message, SubscriptionError> {
            panic!("transport exploded");
        }
    }

    #[tokio::test]
    async fn receive_panic_is_treated_as_a_receive_error() {
        let handler = HandlerFn::arc(|_req: Request| async { Ok(()) });
        let consumer = Consumer::new("exploding", Arc::new(Exploding), handler, 1);
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();

        consumer.serve_with(CancellationToken::new(), &bus).await;

        let mut reason = None;
        let mut stopped = false;
        while let Ok(ev) = rx.try_recv() {
            match ev.kind {
                EventKind::ReceiveFailed => reason = ev.reason.clone(),
                EventKind::ConsumerStopped => stopped = true,
                _ => {}
            }
        }
        assert_eq!(reason.as_deref(), Some("receive panicked: transport exploded"));
        assert!(stopped);
    }

    #[tokio::test]
    async fn canceled_handlers_and_capacity_are_reported() {
        let (tx, sub) = ChannelSubscription::new(4);
        let handler = HandlerFn::arc(|req: Request| async move {
            req.token.cancelled().await;
            req.message.nack();
            Err(HandlerError::Canceled)
        });
        let consumer = Consumer::new("patient", Arc::new(sub), handler, 3);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();

        tx.send(msg(1)).await.unwrap();
        let token = CancellationToken::new();
        let serve = tokio::spawn({
            let token = token.clone();
            async move { consumer.serve_with(token, &bus).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        serve.await.unwrap();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let starting = events
            .iter()
            .find(|e| e.kind == EventKind::ConsumerStarting)
            .unwrap();
        assert_eq!(starting.capacity, Some(3));
        assert_eq!(starting.in_flight, None);
        assert!(events.iter().any(|e| e.kind == EventKind::HandlerCanceled));
        assert!(!events.iter().any(|e| e.kind == EventKind::HandlerFailed));
    }

    struct Collect(Arc<std::sync::Mutex<Vec<EventKind>>>);

    #[async_trait::async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &RuntimeEvent) {
            self.0.lock().unwrap().push(event.kind);
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    #[tokio::test]
    async fn standalone_serve_reports_to_subscribers() {
        let (tx, sub) = ChannelSubscription::new(4);
        let handler = HandlerFn::arc(|_req: Request| async {
            Err(HandlerError::new(ErrorKind::Internal, "downstream unavailable"))
        });
        let consumer = Consumer::new("lonely", Arc::new(sub), handler, 1);
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        tx.send(msg(1)).await.unwrap();
        drop(tx);
        consumer
            .serve_observed(CancellationToken::new(), vec![Arc::new(Collect(seen.clone()))])
            .await;

        let kinds = seen.lock().unwrap().clone();
        assert!(kinds.contains(&EventKind::HandlerFailed), "{kinds:?}");
        assert!(kinds.contains(&EventKind::ReceiveFailed), "{kinds:?}");
        assert_eq!(kinds.last(), Some(&EventKind::ConsumerStopped));
    }

    #[test]
    fn max_handlers_is_clamped_to_one() {
        let (_tx, sub) = ChannelSubscription::new(1);
        let handler = HandlerFn::arc(|_req: Request| async { Ok(()) });
        let consumer = Consumer::new("zero", Arc::new(sub), handler, 0);
        assert_eq!(consumer.max_handlers(), 1);
    }
}
