//! # Server: registry of consumers with coordinated start and drain.
//!
//! The [`Server`] owns the lifecycle [`Bus`], a [`SubscriberSet`] listener and
//! a root [`CancellationToken`]. Each registered [`Consumer`] runs on its own
//! child token; cancelling the root shuts all of them down.
//!
//! ## Architecture
//! ```text
//! add_consumer(c1), add_consumer(c2) ...            (state: Created)
//!
//! serve():                                          (state: Serving)
//!   ├─► listener: Bus.subscribe() ─► SubscriberSet::emit_arc()
//!   ├─► for each consumer:
//!   │     child = root.child_token()
//!   │     set.spawn(consumer.serve_with(child, bus))
//!   └─► root.cancelled().await
//!
//! close() / OS signal ─► root.cancel()             (state: ShuttingDown)
//!   ├─► Bus.publish(ShutdownRequested)
//!   └─► wait for every consumer drain (bounded by cfg.grace when set)
//!         ├─ all joined      → Bus.publish(AllStopped)
//!         ├─ consumer died   → Bus.publish(ConsumerPanicked), Err(ConsumerPanicked)
//!         └─ grace exceeded  → Bus.publish(GraceExceeded), Err(GraceExceeded)
//!                                                   (state: Stopped)
//! ```
//!
//! ## Rules
//! - `serve` runs once; a second call returns [`RuntimeError::AlreadyStarted`]
//! - consumers can only be added before `serve`
//! - `serve` keeps blocking after every consumer stopped on its own, until
//!   the root token is cancelled
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use eventvisor::{Config, Server};
//! use eventvisor::consumer::{ChannelSubscription, Consumer, HandlerFn, Request};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let server = Server::new(cfg.clone());
//!
//!     let (_tx, sub) = ChannelSubscription::new(16);
//!     let handler = HandlerFn::arc(|req: Request| async move {
//!         req.message.ack();
//!         Ok(())
//!     });
//!     server.add_consumer(Consumer::with_defaults("orders", Arc::new(sub), handler, &cfg))?;
//!
//!     server.serve_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::dispatcher::Consumer;
use super::listener::Listener;
use super::shutdown::ShutdownSignal;
use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, EventKind, RuntimeEvent};
use crate::subscribers::{panic_message, LogWriter, Subscribe};

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Accepting consumers; not started.
    Created,
    /// Consumers running.
    Serving,
    /// Root token cancelled; consumers draining.
    ShuttingDown,
    /// Every consumer returned (or the grace period ran out).
    Stopped,
}

/// Registered but not yet started components.
struct Pending {
    consumers: Vec<Consumer>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Registry of consumers sharing one root cancellation token.
pub struct Server {
    cfg: Config,
    bus: Bus,
    root: CancellationToken,
    pending: Mutex<Pending>,
    state: watch::Sender<ServerState>,
}

impl Server {
    /// Creates a server with a [`LogWriter`] subscriber and a fresh root token.
    pub fn new(cfg: Config) -> Self {
        Self::builder(cfg)
            .with_subscribers(vec![Arc::new(LogWriter::new())])
            .build()
    }

    /// Like [`Server::new`] but bound to an externally owned root token.
    pub fn with_token(cfg: Config, token: CancellationToken) -> Self {
        Self::builder(cfg)
            .with_subscribers(vec![Arc::new(LogWriter::new())])
            .with_token(token)
            .build()
    }

    pub fn builder(cfg: Config) -> ServerBuilder {
        ServerBuilder::new(cfg)
    }

    /// Registers a consumer. Rejected once `serve` has started.
    pub fn add_consumer(&self, consumer: Consumer) -> Result<(), RuntimeError> {
        let mut pending = self.lock_pending();
        if *self.state.borrow() != ServerState::Created {
            return Err(RuntimeError::AlreadyStarted);
        }
        pending.consumers.push(consumer);
        Ok(())
    }

    /// Starts every consumer and blocks until the root token is cancelled and
    /// all consumers drained.
    pub async fn serve(&self) -> Result<(), RuntimeError> {
        let Pending {
            consumers,
            subscribers,
        } = self.start()?;
        let listener = Listener::spawn(&self.bus, subscribers);

        let mut set = JoinSet::new();
        let mut running = BTreeMap::new();
        for (idx, consumer) in consumers.into_iter().enumerate() {
            let child = self.root.child_token();
            let bus = self.bus.clone();
            running.insert(idx, consumer.name().to_string());
            set.spawn(async move {
                let outcome = AssertUnwindSafe(consumer.serve_with(child, &bus))
                    .catch_unwind()
                    .await;
                (idx, outcome.err().map(|p| panic_message(p.as_ref())))
            });
        }

        self.root.cancelled().await;
        self.state.send_replace(ServerState::ShuttingDown);
        self.bus.publish(RuntimeEvent::new(EventKind::ShutdownRequested));

        let res = self.wait_all(&mut set, running).await;
        self.state.send_replace(ServerState::Stopped);
        listener.stop().await;
        res
    }

    /// Like [`Server::serve`], also shutting down on SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
    pub async fn serve_until_signal(&self) -> Result<(), RuntimeError> {
        let signal = ShutdownSignal::install()?;
        let root = self.root.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                _ = signal.recv() => root.cancel(),
                _ = root.cancelled() => {},
            }
        });
        let res = self.serve().await;
        watcher.abort();
        res
    }

    /// Cancels the root token; `serve` drains and returns.
    pub fn close(&self) {
        self.root.cancel();
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Receiver observing state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Root token; cancelling it is equivalent to [`Server::close`].
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Lifecycle bus shared with every consumer.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Moves `Created → Serving` and takes the registered components.
    fn start(&self) -> Result<Pending, RuntimeError> {
        let mut pending = self.lock_pending();
        let started = self.state.send_if_modified(|s| {
            if *s == ServerState::Created {
                *s = ServerState::Serving;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(RuntimeError::AlreadyStarted);
        }
        Ok(Pending {
            consumers: std::mem::take(&mut pending.consumers),
            subscribers: std::mem::take(&mut pending.subscribers),
        })
    }

    /// Waits for all consumers, bounded by the configured grace period when set.
    async fn wait_all(
        &self,
        set: &mut JoinSet<(usize, Option<String>)>,
        mut running: BTreeMap<usize, String>,
    ) -> Result<(), RuntimeError> {
        let mut failed = Vec::new();
        let done = async {
            while let Some(res) = set.join_next().await {
                let (name, reason) = match res {
                    Ok((idx, None)) => {
                        running.remove(&idx);
                        continue;
                    }
                    Ok((idx, Some(reason))) => (running.remove(&idx), reason),
                    Err(e) => (None, e.to_string()),
                };
                let name = name.unwrap_or_else(|| "unknown".to_string());
                self.bus.publish(
                    RuntimeEvent::new(EventKind::ConsumerPanicked)
                        .with_consumer(name.as_str())
                        .with_reason(reason),
                );
                failed.push(name);
            }
        };

        if let Some(grace) = self.cfg.grace_period() {
            if tokio::time::timeout(grace, done).await.is_err() {
                let stuck: Vec<String> = running.into_values().collect();
                self.bus.publish(
                    RuntimeEvent::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                return Err(RuntimeError::GraceExceeded { grace, stuck });
            }
        } else {
            done.await;
        }

        self.bus.publish(RuntimeEvent::new(EventKind::AllStopped));
        if failed.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::ConsumerPanicked { consumers: failed })
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for a [`Server`] with custom subscribers or root token.
pub struct ServerBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    token: Option<CancellationToken>,
}

impl ServerBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            token: None,
        }
    }

    /// Sets the runtime event subscribers (replaces any previous set).
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn build(self) -> Server {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let (state, _rx) = watch::channel(ServerState::Created);
        Server {
            cfg: self.cfg,
            bus,
            root: self.token.unwrap_or_else(CancellationToken::new),
            pending: Mutex::new(Pending {
                consumers: Vec::new(),
                subscribers: self.subscribers,
            }),
            state,
        }
    }
}
