//! # Raw messages pulled from a subscription.
//!
//! A [`Message`] is opaque to the dispatcher: it carries the body, string
//! metadata, and an optional [`Acker`] supplied by the transport. Only the
//! handler acknowledges; the dispatcher never does. Bodies produced by
//! [`Message::from_context`] decode back with [`Message::context`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{ErrorKind, HandlerError};
use crate::record::EventContext;

/// Transport hook invoked when a handler settles a message.
pub trait Acker: Send + Sync + 'static {
    /// Positive acknowledgement: the message was processed.
    fn ack(&self, message_id: &str);

    /// Negative acknowledgement: the transport may redeliver.
    fn nack(&self, message_id: &str) {
        let _ = message_id;
    }
}

/// Message as yielded by a [`Subscription`](super::Subscription).
pub struct Message {
    id: String,
    body: Vec<u8>,
    metadata: BTreeMap<String, String>,
    acker: Option<Arc<dyn Acker>>,
    settled: AtomicBool,
}

impl Message {
    pub fn new(id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            body,
            metadata: BTreeMap::new(),
            acker: None,
            settled: AtomicBool::new(false),
        }
    }

    /// Encodes `ctx` as a JSON body; the message id is the event id.
    pub fn from_context(ctx: &EventContext) -> Result<Self, serde_json::Error> {
        Ok(Self::new(ctx.event.id(), serde_json::to_vec(ctx)?))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_acker(mut self, acker: Arc<dyn Acker>) -> Self {
        self.acker = Some(acker);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Decodes the body as an [`EventContext`].
    ///
    /// Fails with [`ErrorKind::InvalidField`] when the body is not one.
    pub fn context(&self) -> Result<EventContext, HandlerError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HandlerError::new(ErrorKind::InvalidField, format!("event context: {e}")))
    }

    /// Acknowledges the message. Only the first ack/nack reaches the transport.
    pub fn ack(&self) {
        if !self.settled.swap(true, Ordering::AcqRel) {
            if let Some(acker) = &self.acker {
                acker.ack(&self.id);
            }
        }
    }

    /// Negatively acknowledges the message. Only the first ack/nack reaches the transport.
    pub fn nack(&self) {
        if !self.settled.swap(true, Ordering::AcqRel) {
            if let Some(acker) = &self.acker {
                acker.nack(&self.id);
            }
        }
    }

    /// True once `ack` or `nack` was called.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("body_len", &self.body.len())
            .field("metadata", &self.metadata)
            .field("settled", &self.is_settled())
            .finish()
    }
}
