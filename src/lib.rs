//! # eventvisor
//!
//! **Eventvisor** is a concurrent event-dispatch engine for Rust services.
//!
//! It has two halves:
//! - a **consumer server** that pulls messages from named subscriptions and
//!   runs a user handler per message, never exceeding a per-subscription
//!   handler cap, with cooperative cancellation and an ordered drain;
//! - a **fan-out broker** that routes published events to a dynamic set of
//!   long-lived client streams, either to everyone or to one addressed
//!   client, and can serve them as server-sent events.
//!
//! Transport clients (Kafka, NATS, ...), persistence and authentication are
//! left to the surrounding service; the engine starts once raw messages and
//! events are available.
//!
//! ## Architecture
//! ### Consumer server
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Subscription │   │ Subscription │   │ Subscription │
//!     │  "orders"    │   │  "payments"  │   │  "audit"     │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Server (consumer registry)                                       │
//! │  - root CancellationToken, one child token per consumer           │
//! │  - Bus (broadcast runtime events)                                 │
//! │  - SubscriberSet (fans out to LogWriter and user subscribers)     │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Consumer   │   │   Consumer   │   │   Consumer   │
//!     │ (semaphore,  │   │ (semaphore,  │   │ (semaphore,  │
//!     │ max_handlers)│   │ max_handlers)│   │ max_handlers)│
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘
//!      ▼                  ▼                  ▼
//!   handler tasks      handler tasks      handler tasks
//! ```
//!
//! ### Consumer lifecycle
//! ```text
//! loop {
//!   ├─► receive(token)           (error → terminal, stop pulling)
//!   ├─► acquire permit           (cancellation → drop pending message)
//!   └─► spawn handler(Request { token: child, message })
//! }
//! drain: acquire all max_handlers permits ─► subscription.shutdown()
//! ```
//!
//! ### Broker
//! ```text
//! publisher ──► Broker::publish(StreamEvent)
//!                   │  consumer == 0 → every subscriber (own id stamped)
//!                   │  consumer == n → subscriber n only
//!                   ▼
//!           Subscriber channels ──► serve_stream / GET /events ──► clients
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Consumption**   | Bounded dispatch of subscription messages to handlers.    | [`Consumer`], [`Server`], [`consumer::Handler`] |
//! | **Broadcast**     | Broadcast or targeted delivery to live client streams.    | [`Broker`], [`StreamEvent`]                 |
//! | **Records**       | Event payload with closed kind/priority/provider enums.   | [`record::EventRecord`], [`record::EventContext`] |
//! | **Identifiers**   | Time-ordered 64 bit distributed ids.                      | [`ids::Sonyflake`], [`ids::IdGenerator`]    |
//! | **Observability** | Runtime lifecycle events forwarded to subscribers.        | [`subscribers::Subscribe`], [`subscribers::LogWriter`] |
//! | **Errors**        | Typed errors and a transport-neutral error taxonomy.      | [`RuntimeError`], [`ErrorKind`]             |
//! | **Configuration** | Defaults, TOML file and `EVENTVISOR_*` env overrides.     | [`Config`]                                  |
//!
//! ## Optional features
//! - `http` _(default)_: axum server-sent events endpoint ([`broker::sse`]).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::{Config, Consumer, Server};
//! use eventvisor::consumer::{ChannelSubscription, HandlerFn, Message, Request};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let server = Arc::new(Server::new(cfg.clone()));
//!
//!     let (tx, sub) = ChannelSubscription::new(16);
//!     let handler = HandlerFn::arc(|req: Request| async move {
//!         println!("got {} bytes", req.message.body().len());
//!         req.message.ack();
//!         Ok(())
//!     });
//!     server.add_consumer(Consumer::with_defaults("orders", Arc::new(sub), handler, &cfg))?;
//!
//!     let running = tokio::spawn({
//!         let server = Arc::clone(&server);
//!         async move { server.serve().await }
//!     });
//!
//!     tx.send(Message::new("1", b"hello".to_vec())).await?;
//!     server.close();
//!     running.await??;
//!     Ok(())
//! }
//! ```

mod config;
mod error;

pub mod broker;
pub mod consumer;
pub mod events;
pub mod ids;
pub mod record;
pub mod subscribers;

// ---- Public re-exports ----

pub use broker::{Broker, StreamEvent};
pub use config::Config;
pub use consumer::{Consumer, Server, ServerState};
pub use error::{
    BrokerError, ConfigError, ErrorKind, HandlerError, IdError, RuntimeError, SubscriptionError,
};
