//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`RuntimeEvent`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Server`, `Consumer`, handler tasks, `SubscriberSet` workers.
//! - **Consumers**: the server's listener, which fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{EventKind, RuntimeEvent};
