//! # Event record: the immutable unit carried through the dispatch pipeline.
//!
//! ## Example
//! ```rust
//! use eventvisor::record::{EventRecord, EventType, Priority, Provider};
//!
//! let ev = EventRecord::builder("author", b"message 1".to_vec())
//!     .event_type(EventType::Integration)
//!     .priority(Priority::Mid)
//!     .provider(Provider::RabbitMq)
//!     .build();
//!
//! assert_eq!(ev.service_name(), "AUTHOR");
//! assert_eq!(ev.priority(), Priority::Mid);
//! assert!(ev.transaction_id().is_none());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kinds::{EventType, Priority, Provider};

/// Event log record with routing metadata.
///
/// Fields are private; a record is read-only once built. Handlers receive it
/// by reference or clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "event_id")]
    id: String,
    service_name: String,
    event_type: EventType,
    priority: Priority,
    provider: Provider,
    content: Vec<u8>,
    dispatch_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tracing_context: Option<String>,
}

impl EventRecord {
    /// Creates a record with default kinds (`Domain`, `Low`, `Kafka`).
    pub fn new(service_name: &str, content: Vec<u8>) -> Self {
        Self::builder(service_name, content).build()
    }

    /// Creates a record from free-form strings, normalizing unknown kinds to defaults.
    ///
    /// Use at untyped boundaries (headers, CLI flags); typed callers should
    /// prefer [`EventRecord::builder`].
    pub fn from_raw(
        service_name: &str,
        event_type: &str,
        priority: &str,
        provider: &str,
        content: Vec<u8>,
    ) -> Self {
        Self::builder(service_name, content)
            .event_type(EventType::parse_lossy(event_type))
            .priority(Priority::parse_lossy(priority))
            .provider(Provider::parse_lossy(provider))
            .build()
    }

    /// Starts a builder.
    pub fn builder(service_name: &str, content: Vec<u8>) -> EventRecordBuilder {
        EventRecordBuilder {
            service_name: service_name.to_uppercase(),
            content,
            event_type: EventType::default(),
            priority: Priority::default(),
            provider: Provider::default(),
            transaction_id: None,
            tracing_context: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn dispatch_time(&self) -> DateTime<Utc> {
        self.dispatch_time
    }

    /// Distributed transaction id; `None` outside multi-step transactions.
    pub fn transaction_id(&self) -> Option<u64> {
        self.transaction_id
    }

    /// Opaque span context for trace propagation.
    pub fn tracing_context(&self) -> Option<&str> {
        self.tracing_context.as_deref()
    }
}

/// Builder for [`EventRecord`].
#[derive(Debug, Clone)]
pub struct EventRecordBuilder {
    service_name: String,
    content: Vec<u8>,
    event_type: EventType,
    priority: Priority,
    provider: Provider,
    transaction_id: Option<u64>,
    tracing_context: Option<String>,
}

impl EventRecordBuilder {
    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Marks the record as part of a distributed transaction.
    ///
    /// `0` means "no transaction" and leaves the field unset.
    pub fn transaction_id(mut self, id: u64) -> Self {
        self.transaction_id = (id != 0).then_some(id);
        self
    }

    pub fn tracing_context(mut self, ctx: impl Into<String>) -> Self {
        self.tracing_context = Some(ctx.into());
        self
    }

    /// Stamps id and dispatch time, producing the immutable record.
    pub fn build(self) -> EventRecord {
        EventRecord {
            id: Uuid::new_v4().to_string(),
            service_name: self.service_name,
            event_type: self.event_type,
            priority: self.priority,
            provider: self.provider,
            content: self.content,
            dispatch_time: Utc::now(),
            transaction_id: self.transaction_id,
            tracing_context: self.tracing_context,
        }
    }
}
