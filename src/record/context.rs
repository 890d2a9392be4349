//! # Event context: a record together with its SAGA transaction.
//!
//! This is the payload handlers decode from a [`Message`](crate::consumer::Message)
//! body; see [`Request::context`](crate::consumer::Request::context).
//!
//! ## Example
//! ```rust
//! use eventvisor::record::{EventContext, EventRecord, Transaction};
//!
//! let ctx = EventContext::new(EventRecord::new("author", b"{}".to_vec()))
//!     .with_transaction(Transaction::new("tx-1", "author-9", "UPDATE"));
//!
//! let body = serde_json::to_vec(&ctx).unwrap();
//! let back: EventContext = serde_json::from_slice(&body).unwrap();
//! assert_eq!(back, ctx);
//! ```

use serde::{Deserialize, Serialize};

use super::event::EventRecord;
use super::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub event: EventRecord,
    /// Present only for steps of a distributed transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

impl EventContext {
    pub fn new(event: EventRecord) -> Self {
        Self {
            event,
            transaction: None,
        }
    }

    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }
}

impl From<EventRecord> for EventContext {
    fn from(event: EventRecord) -> Self {
        Self::new(event)
    }
}
