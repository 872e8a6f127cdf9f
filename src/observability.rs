//! Correlation for engine operations
//!
//! Every submission, batch and bundle gets a [`TraceContext`]. Batch items run under
//! child contexts, so all attempts of all items share the batch's correlation id.

use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of one engine operation within a trace
#[derive(Debug, Clone)]
pub struct TraceContext {
    trace_id: Uuid,
    span_id: Uuid,
    parent_span_id: Option<Uuid>,
    correlation_id: CorrelationId,
    operation: String,
}

impl TraceContext {
    /// Root context for a new operation ("submit", "batch", "bundle")
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            correlation_id: CorrelationId::new(),
            operation: operation.into(),
        }
    }

    /// Child sharing trace and correlation ids, parented to this span
    pub fn child_span(&self, operation: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            correlation_id: self.correlation_id,
            operation: operation.into(),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    pub fn span_id(&self) -> Uuid {
        self.span_id
    }

    pub fn parent_span_id(&self) -> Option<Uuid> {
        self.parent_span_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}
