//! # Bounded-concurrency message consumption.
//!
//! - [`Subscription`] yields raw [`Message`]s from some transport.
//! - [`Handler`] processes one message and owns its acknowledgement.
//! - [`Consumer`] binds the two with a per-subscription handler cap.
//! - [`Server`] starts a set of consumers and drains them on shutdown.
//!
//! ```text
//! Server ──► Consumer "orders"   ──► Handler task × ≤ max_handlers
//!        ──► Consumer "payments" ──► Handler task × ≤ max_handlers
//! ```

mod channel;
mod dispatcher;
mod handler;
mod listener;
mod message;
mod server;
mod shutdown;
mod subscription;

pub use channel::ChannelSubscription;
pub use dispatcher::Consumer;
pub use handler::{BoxHandlerFuture, Handler, HandlerFn, HandlerRef, Request};
pub use message::{Acker, Message};
pub use server::{Server, ServerBuilder, ServerState};
pub use shutdown::ShutdownSignal;
pub use subscription::{Subscription, SubscriptionRef};
