//! # Runtime event subscribers.
//!
//! ```text
//!   Consumer ── publish(RuntimeEvent) ──► Bus ──► Server listener ──► SubscriberSet
//!                                                                        │
//!                                                          ┌─────────────┼──────────┐
//!                                                          ▼             ▼          ▼
//!                                                       LogWriter     Metrics    Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use eventvisor::events::{EventKind, RuntimeEvent};
//! use eventvisor::subscribers::Subscribe;
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &RuntimeEvent) {
//!         if event.kind == EventKind::HandlerFailed {
//!             // increment failure counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

pub(crate) use set::panic_message;
