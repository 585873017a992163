use std::sync::Arc;

use crate::buffer::{BufferGuard, BufferPool, Entry, open_scope};
use crate::context::Context;
use crate::error::Error;
use crate::handler::Handler;
use crate::record::{Attr, Level, Record};

pub(crate) type Sampler = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// A [`Handler`] that samples records per request.
///
/// Records at or above the minimum level always pass. Below it, records pass
/// only if the sampler accepts the request's [`Context`]. Inside a buffer
/// scope opened with [`with_buffer`](SamplingBuffer::with_buffer), unsampled
/// low-level records are held back instead of dropped, and emitted in order
/// just before the first record that reaches the minimum level.
///
/// Construct via [`SamplingBuffer::builder()`](crate::SamplingBufferBuilder).
#[derive(Clone)]
pub struct SamplingBuffer {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) sampler: Sampler,
    pub(crate) level: Level,
    pub(crate) pool: Arc<BufferPool>,
}

impl SamplingBuffer {
    /// Open a buffer scope for a request or operation.
    ///
    /// Log through the returned context for the lifetime of the operation and
    /// drop the guard when it completes. Anything still deferred at that
    /// point is discarded.
    ///
    /// ```
    /// # use tracing_log_gate::{Context, SamplingBuffer, TextHandler};
    /// let handler = SamplingBuffer::builder()
    ///     .handler(TextHandler::builder().build())
    ///     .sampler(|_: &Context| false)
    ///     .build()
    ///     .unwrap();
    ///
    /// let (cx, guard) = handler.with_buffer(&Context::new());
    /// // ... handle the request, logging with `cx` ...
    /// drop(guard);
    /// # let _ = cx;
    /// ```
    pub fn with_buffer(&self, cx: &Context) -> (Context, BufferGuard) {
        open_scope(&self.pool, cx)
    }

    fn wrap(&self, handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(SamplingBuffer {
            handler,
            sampler: self.sampler.clone(),
            level: self.level,
            pool: self.pool.clone(),
        })
    }
}

impl Handler for SamplingBuffer {
    fn enabled(&self, cx: &Context, level: Level) -> bool {
        if !self.handler.enabled(cx, level) {
            return false;
        }
        // Unsampled records outside a buffer scope can only pass at the minimum level.
        if !cx.is_buffered() && !(self.sampler)(cx) {
            return level >= self.level;
        }
        true
    }

    fn handle(&self, cx: &Context, record: Record) -> Result<(), Error> {
        if (self.sampler)(cx) {
            return self.handler.handle(cx, record);
        }

        match cx.live_scope() {
            Some((buffer, scope)) if record.level < self.level => {
                buffer.append_to_scope(scope, Entry::new(self.handler.clone(), cx, record))
            }
            Some((buffer, scope)) => {
                buffer.drain_scope(scope);
                self.handler.handle(cx, record)
            }
            None if record.level < self.level => Ok(()),
            None => self.handler.handle(cx, record),
        }
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn Handler> {
        self.wrap(self.handler.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        self.wrap(self.handler.with_group(name))
    }
}
