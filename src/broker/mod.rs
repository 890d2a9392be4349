//! # Fan-out broker for long-lived client streams.
//!
//! - [`Broker`] owns the subscriber registry (no process-wide state).
//! - [`StreamEvent`] is routed to all subscribers (`consumer == 0`) or one.
//! - [`Broker::serve_stream`] pumps one client over any `AsyncWrite`.
//! - `sse` (feature `http`) exposes the broker as an axum SSE endpoint.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use eventvisor::broker::{Broker, StreamEvent};
//! use eventvisor::ids::CounterIds;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let broker = Broker::new(Arc::new(CounterIds::default()));
//! let mut client = broker.subscribe().await.unwrap();
//!
//! let ev = StreamEvent::new("hello", client.id(), broker.ids()).unwrap();
//! assert_eq!(broker.publish(ev).await, 1);
//! assert_eq!(client.recv().await.unwrap().message, b"hello");
//! # }
//! ```

#[allow(clippy::module_inception)]
mod broker;
mod event;
#[cfg(feature = "http")]
pub mod sse;

pub use broker::{Broker, Subscriber};
pub use event::{StreamEvent, WireEvent, BROADCAST};
