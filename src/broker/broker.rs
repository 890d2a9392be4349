//! # Broker: fan-out of stream events to live subscribers.
//!
//! ```text
//! subscribe() ──► id = ids.next_id() ──► registry[id] = Sender (capacity 1)
//!
//! publish(ev) ── lock ──┬─ ev.consumer == 0 ─► every entry, copy.consumer = entry id
//!                       └─ ev.consumer == n ─► entry n only (first match)
//!                each send awaits the recipient while the lock is held
//!
//! unsubscribe(id) ── lock ──► remove entry (drops Sender, closes channel)
//! close()         ── lock ──► remove every entry
//! ```
//!
//! ## Rules
//! - Publishes are serialized by the registry lock; a slow subscriber stalls
//!   every publisher until it reads
//! - A subscriber whose receiver is gone is skipped, not waited on
//! - Id `0` is never assigned; it addresses every subscriber
//! - Unknown ids are ignored by `unsubscribe` and targeted `publish`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::StreamEvent;
use crate::config::Config;
use crate::error::BrokerError;
use crate::ids::{IdGenerator, IdRef};

/// Receiving end of one broker registration.
#[derive(Debug)]
pub struct Subscriber {
    id: u64,
    rx: mpsc::Receiver<StreamEvent>,
}

impl Subscriber {
    /// Distributed id assigned at subscribe time.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once unsubscribed or the broker closed.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

struct Inner {
    ids: IdRef,
    consumers: Mutex<BTreeMap<u64, mpsc::Sender<StreamEvent>>>,
    keepalive: Option<Duration>,
}

/// Owned registry of stream subscribers. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl Broker {
    pub fn new(ids: IdRef) -> Self {
        Self::with_keepalive(ids, None)
    }

    /// Broker whose HTTP streams send keep-alive comments every `keepalive`.
    pub fn with_keepalive(ids: IdRef, keepalive: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                ids,
                consumers: Mutex::new(BTreeMap::new()),
                keepalive,
            }),
        }
    }

    /// Broker using the configured Sonyflake generator and keep-alive interval.
    pub fn from_config(cfg: &Config) -> Self {
        Self::with_keepalive(Arc::new(cfg.id_generator()), cfg.keepalive())
    }

    /// Registers a new subscriber under a fresh distributed id.
    pub async fn subscribe(&self) -> Result<Subscriber, BrokerError> {
        let mut consumers = self.inner.consumers.lock().await;
        let id = self.inner.ids.next_id()?;
        let (tx, rx) = mpsc::channel(1);
        consumers.insert(id, tx);
        debug!(target: "eventvisor::broker", client = id, total = consumers.len(), "client connected");
        Ok(Subscriber { id, rx })
    }

    /// Removes the registration for `id`, closing its channel.
    ///
    /// Returns `false` if `id` was not registered.
    pub async fn unsubscribe(&self, id: u64) -> bool {
        let mut consumers = self.inner.consumers.lock().await;
        let removed = consumers.remove(&id).is_some();
        debug!(
            target: "eventvisor::broker",
            client = id,
            removed,
            remaining = consumers.len(),
            "client disconnected"
        );
        removed
    }

    /// Delivers `event` and returns the number of subscribers that received it.
    pub async fn publish(&self, event: StreamEvent) -> usize {
        let consumers = self.inner.consumers.lock().await;
        let mut delivered = 0;

        if event.is_broadcast() {
            for (&id, tx) in consumers.iter() {
                let copy = StreamEvent {
                    consumer: id,
                    ..event.clone()
                };
                if tx.send(copy).await.is_ok() {
                    delivered += 1;
                }
            }
        } else if let Some(tx) = consumers.get(&event.consumer) {
            if tx.send(event).await.is_ok() {
                delivered = 1;
            }
        }

        debug!(target: "eventvisor::broker", delivered, "published message");
        delivered
    }

    /// Removes every registration. Safe to call repeatedly.
    pub async fn close(&self) {
        let mut consumers = self.inner.consumers.lock().await;
        let n = consumers.len();
        consumers.clear();
        debug!(target: "eventvisor::broker", closed = n, "broker closed");
    }

    pub async fn len(&self) -> usize {
        self.inner.consumers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.consumers.lock().await.is_empty()
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.inner.ids.as_ref()
    }

    pub fn keepalive(&self) -> Option<Duration> {
        self.inner.keepalive
    }

    /// Streams events for one client to `writer` as `data: {json}\n\n` frames.
    ///
    /// The client first receives a greeting addressed to its own id with an
    /// empty message. Returns on cancellation, broker close or write failure,
    /// always unsubscribing first.
    pub async fn serve_stream<W>(&self, writer: &mut W, token: &CancellationToken) -> Result<(), BrokerError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut sub = self.subscribe().await?;
        let id = sub.id();
        let res = self.pump(&mut sub, writer, token).await;
        // Drop the receiver first so a publish blocked on it releases the lock.
        drop(sub);
        self.unsubscribe(id).await;
        res
    }

    async fn pump<W>(&self, sub: &mut Subscriber, writer: &mut W, token: &CancellationToken) -> Result<(), BrokerError>
    where
        W: AsyncWrite + Unpin,
    {
        self.greet(sub.id())?;
        loop {
            let event = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                ev = sub.recv() => match ev {
                    Some(ev) => ev,
                    None => return Ok(()),
                },
            };
            // A client that stops reading must not pin the registration.
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                res = write_frame(writer, &event) => res?,
            }
        }
    }

    /// Publishes the self-addressed greeting from a separate task; the caller
    /// is the only reader of that channel.
    pub(crate) fn greet(&self, id: u64) -> Result<(), BrokerError> {
        let greeting = StreamEvent::new(Vec::new(), id, self.ids())?;
        let broker = self.clone();
        tokio::spawn(async move {
            broker.publish(greeting).await;
        });
        Ok(())
    }
}

/// Writes one SSE frame and flushes.
async fn write_frame<W>(writer: &mut W, event: &StreamEvent) -> Result<(), BrokerError>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(&event.to_wire())?;
    writer.write_all(format!("data: {json}\n\n").as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
