use serde::{Deserialize, Serialize};

/// SAGA-style transaction metadata attached to multi-step workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id.
    #[serde(rename = "transaction_id")]
    pub id: String,
    /// Aggregate/entity id the transaction operates on.
    pub root_id: String,
    /// Root span id, if traced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// Trace id, if traced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Kind of operation to perform.
    pub operation: String,
    /// Entity backup for update-like operations (compensation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        root_id: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            root_id: root_id.into(),
            span_id: None,
            trace_id: None,
            operation: operation.into(),
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }
}
