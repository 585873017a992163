use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::record::{Attr, Level, Record};

/// A link in a log handler chain.
///
/// Wrapping handlers ([`RateLimiter`](crate::RateLimiter),
/// [`SamplingBuffer`](crate::SamplingBuffer)) implement this trait themselves
/// so they compose transparently with sinks like [`TextHandler`](crate::TextHandler).
pub trait Handler: Send + Sync {
    /// Reports whether a record at `level` would be handled.
    fn enabled(&self, cx: &Context, level: Level) -> bool;

    /// Handle a record. Dropping or deferring a record is not an error.
    fn handle(&self, cx: &Context, record: Record) -> Result<(), Error>;

    /// Returns a handler whose records all carry `attrs`.
    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn Handler>;

    /// Returns a handler that qualifies subsequent attribute keys with `name`.
    fn with_group(&self, name: &str) -> Arc<dyn Handler>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn enabled(&self, cx: &Context, level: Level) -> bool {
        (**self).enabled(cx, level)
    }

    fn handle(&self, cx: &Context, record: Record) -> Result<(), Error> {
        (**self).handle(cx, record)
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn Handler> {
        (**self).with_attrs(attrs)
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        (**self).with_group(name)
    }
}
