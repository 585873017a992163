use std::fmt;
use std::sync::Arc;

use crate::buffer::RecordBuffer;
use crate::trace::TraceContext;

/// Per-call context threaded alongside every record.
///
/// A context carries the request's [`TraceContext`], if any, and the buffer
/// scope opened by [`SamplingBuffer::with_buffer`](crate::SamplingBuffer::with_buffer).
/// Cloning is cheap.
#[derive(Clone, Default)]
pub struct Context {
    trace: Option<TraceContext>,
    scope: Option<ScopeBinding>,
}

#[derive(Clone)]
struct ScopeBinding {
    buffer: Arc<RecordBuffer>,
    id: u64,
}

impl Context {
    /// An empty context: no trace, no buffer scope.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }

    /// Whether this context is bound to a buffer scope that is still open.
    pub fn is_buffered(&self) -> bool {
        self.buffer().is_some()
    }

    pub(crate) fn bind(&self, buffer: Arc<RecordBuffer>, id: u64) -> Self {
        Self {
            trace: self.trace,
            scope: Some(ScopeBinding { buffer, id }),
        }
    }

    /// The bound buffer, unless its scope has since been released.
    pub(crate) fn buffer(&self) -> Option<&RecordBuffer> {
        self.live_scope().map(|(buffer, _)| buffer)
    }

    /// The bound buffer and the scope id it was bound under. The scope may
    /// still be released after this returns, so writes go through the
    /// buffer's scoped operations.
    pub(crate) fn live_scope(&self) -> Option<(&RecordBuffer, u64)> {
        self.scope
            .as_ref()
            .filter(|scope| scope.buffer.scope() == scope.id)
            .map(|scope| (&*scope.buffer, scope.id))
    }

    /// A copy of this context with the buffer binding removed.
    pub(crate) fn detached(&self) -> Self {
        Self {
            trace: self.trace,
            scope: None,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("trace", &self.trace)
            .field("scope", &self.scope.as_ref().map(|scope| scope.id))
            .finish()
    }
}
