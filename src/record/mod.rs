//! # Event records.
//!
//! - [`EventRecord`] - immutable payload + metadata flowing through consumers
//! - [`EventType`], [`Priority`], [`Provider`] - closed routing enums
//! - [`Transaction`] - SAGA metadata for multi-step workflows
//! - [`EventContext`] - record plus transaction, the body handlers decode

mod context;
mod event;
mod kinds;
mod transaction;

pub use context::EventContext;
pub use event::{EventRecord, EventRecordBuilder};
pub use kinds::{EventType, ParseKindError, Priority, Provider};
pub use transaction::Transaction;
