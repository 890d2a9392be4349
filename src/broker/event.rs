use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IdError;
use crate::ids::IdGenerator;

/// Consumer value addressing every subscriber.
pub const BROADCAST: u64 = 0;

/// Event routed by the [`Broker`](super::Broker).
///
/// `consumer == 0` broadcasts; any other value targets the subscriber with
/// that id. Copies delivered by a broadcast carry the recipient's own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub id: u64,
    pub message: Vec<u8>,
    pub consumer: u64,
}

impl StreamEvent {
    /// Creates an event with a fresh distributed id.
    pub fn new(message: impl Into<Vec<u8>>, consumer: u64, ids: &dyn IdGenerator) -> Result<Self, IdError> {
        Ok(Self {
            id: ids.next_id()?,
            message: message.into(),
            consumer,
        })
    }

    /// Creates a broadcast event with a fresh distributed id.
    pub fn broadcast(message: impl Into<Vec<u8>>, ids: &dyn IdGenerator) -> Result<Self, IdError> {
        Self::new(message, BROADCAST, ids)
    }

    pub fn is_broadcast(&self) -> bool {
        self.consumer == BROADCAST
    }

    /// JSON body of a stream frame.
    pub fn to_wire(&self) -> WireEvent {
        WireEvent {
            event_id: self.id,
            message: String::from_utf8_lossy(&self.message).into_owned(),
            consumer_id: self.consumer,
        }
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: [{},{})",
            self.id,
            String::from_utf8_lossy(&self.message),
            self.consumer
        )
    }
}

/// Wire shape of one stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEvent {
    pub event_id: u64,
    pub message: String,
    pub consumer_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CounterIds;

    #[test]
    fn wire_shape_uses_stream_field_names() {
        let ids = CounterIds::new(7, 1);
        let ev = StreamEvent::new("hello", 42, &ids).unwrap();
        let json = serde_json::to_value(ev.to_wire()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event_id": 7, "message": "hello", "consumer_id": 42})
        );
    }

    #[test]
    fn display_matches_log_format() {
        let ev = StreamEvent {
            id: 1,
            message: b"hi".to_vec(),
            consumer: 0,
        };
        assert!(ev.is_broadcast());
        assert_eq!(ev.to_string(), "1: [hi,0)");
    }
}
