use std::borrow::Cow;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::Handler;
use crate::record::{Attr, Level, Record};

/// Front end of a handler chain.
///
/// Checks [`Handler::enabled`] before building a record, so calls that would be
/// dropped outright cost no allocation.
#[derive(Clone)]
pub struct Logger {
    handler: Arc<dyn Handler>,
}

impl Logger {
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// A logger whose records all carry `attrs`.
    pub fn with(&self, attrs: &[Attr]) -> Self {
        if attrs.is_empty() {
            return self.clone();
        }
        Self {
            handler: self.handler.with_attrs(attrs),
        }
    }

    pub fn with_group(&self, name: &str) -> Self {
        Self {
            handler: self.handler.with_group(name),
        }
    }

    pub fn enabled(&self, cx: &Context, level: Level) -> bool {
        self.handler.enabled(cx, level)
    }

    pub fn log(
        &self,
        cx: &Context,
        level: Level,
        message: impl Into<Cow<'static, str>>,
        attrs: &[Attr],
    ) -> Result<(), Error> {
        if !self.enabled(cx, level) {
            return Ok(());
        }
        let mut record = Record::new(level, message);
        record.attrs.extend_from_slice(attrs);
        self.handler.handle(cx, record)
    }

    pub fn debug(&self, cx: &Context, message: impl Into<Cow<'static, str>>) -> Result<(), Error> {
        self.log(cx, Level::DEBUG, message, &[])
    }

    pub fn info(&self, cx: &Context, message: impl Into<Cow<'static, str>>) -> Result<(), Error> {
        self.log(cx, Level::INFO, message, &[])
    }

    pub fn warn(&self, cx: &Context, message: impl Into<Cow<'static, str>>) -> Result<(), Error> {
        self.log(cx, Level::WARN, message, &[])
    }

    pub fn error(&self, cx: &Context, message: impl Into<Cow<'static, str>>) -> Result<(), Error> {
        self.log(cx, Level::ERROR, message, &[])
    }
}
