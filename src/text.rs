use std::cell::Cell;
use std::fmt::{self, Write as _};
use std::io::{self, Write as _};
use std::sync::Arc;

use thread_local::ThreadLocal;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::fmt::MakeWriter;

use crate::context::Context;
use crate::error::Error;
use crate::handler::Handler;
use crate::record::{Attr, Level, Record, Value};

/// A [`Handler`] that writes records as `key=value` lines.
///
/// ```text
/// time=2024-05-01T12:00:00Z level=WARN msg="slow request" http.status=200
/// ```
///
/// Construct via [`TextHandler::builder()`].
pub struct TextHandler<W = fn() -> io::Stderr> {
    writer: Arc<W>,
    level: Level,
    with_time: bool,
    prefix: Arc<str>,
    preformatted: Arc<str>,
    buf_cache: Arc<ThreadLocal<Cell<Vec<u8>>>>,
}

impl<W> Clone for TextHandler<W> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            level: self.level,
            with_time: self.with_time,
            prefix: self.prefix.clone(),
            preformatted: self.preformatted.clone(),
            buf_cache: self.buf_cache.clone(),
        }
    }
}

/// Builder for [`TextHandler`].
pub struct TextHandlerBuilder<W = fn() -> io::Stderr> {
    writer: W,
    level: Level,
    with_time: bool,
}

impl TextHandler {
    pub fn builder() -> TextHandlerBuilder {
        TextHandlerBuilder {
            writer: io::stderr as fn() -> io::Stderr,
            level: Level::INFO,
            with_time: true,
        }
    }
}

impl<W> TextHandlerBuilder<W> {
    /// Set the output writer. Defaults to stderr.
    pub fn writer<W2>(self, writer: W2) -> TextHandlerBuilder<W2> {
        TextHandlerBuilder {
            writer,
            level: self.level,
            with_time: self.with_time,
        }
    }

    /// Set the lowest level written. Defaults to [`Level::INFO`].
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Do not emit timestamps.
    pub fn without_time(mut self) -> Self {
        self.with_time = false;
        self
    }

    pub fn build(self) -> TextHandler<W> {
        TextHandler {
            writer: Arc::new(self.writer),
            level: self.level,
            with_time: self.with_time,
            prefix: Arc::from(""),
            preformatted: Arc::from(""),
            buf_cache: Arc::new(ThreadLocal::new()),
        }
    }
}

impl<W> TextHandler<W> {
    fn format_record(&self, record: &Record, buf: &mut Vec<u8>) -> fmt::Result {
        let mut out = BufWriter(buf);
        if self.with_time {
            let time = OffsetDateTime::from(record.time)
                .format(&Rfc3339)
                .map_err(|_| fmt::Error)?;
            write!(out, "time={time} ")?;
        }
        write!(out, "level={} msg=", record.level)?;
        write_text(&mut out, &record.message)?;
        out.write_str(&self.preformatted)?;
        for attr in &record.attrs {
            write_attr(&mut out, &self.prefix, attr)?;
        }
        out.0.push(b'\n');
        Ok(())
    }
}

fn write_attr(out: &mut impl fmt::Write, prefix: &str, attr: &Attr) -> fmt::Result {
    out.write_char(' ')?;
    if prefix.is_empty() {
        write_text(out, &attr.key)?;
    } else {
        write_text(out, &format!("{prefix}{}", attr.key))?;
    }
    out.write_char('=')?;
    match &attr.value {
        Value::Str(s) => write_text(out, s),
        other => write!(out, "{other}"),
    }
}

fn write_text(out: &mut impl fmt::Write, s: &str) -> fmt::Result {
    let needs_quotes = s.is_empty()
        || s
            .chars()
            .any(|c| c == ' ' || c == '=' || c == '"' || c.is_control());
    if needs_quotes {
        write!(out, "{s:?}")
    } else {
        out.write_str(s)
    }
}

impl<W> Handler for TextHandler<W>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    fn enabled(&self, _cx: &Context, level: Level) -> bool {
        level >= self.level
    }

    fn handle(&self, _cx: &Context, record: Record) -> Result<(), Error> {
        let cache = self.buf_cache.get_or_default();
        let mut buf = cache.take();
        buf.clear();

        let result = self
            .format_record(&record, &mut buf)
            .map_err(Error::from)
            .and_then(|()| Ok(self.writer.make_writer().write_all(&buf)?));

        cache.set(buf);
        result
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn Handler> {
        let mut preformatted = String::from(&*self.preformatted);
        for attr in attrs {
            // Writing into a String cannot fail.
            let _ = write_attr(&mut preformatted, &self.prefix, attr);
        }
        Arc::new(TextHandler {
            preformatted: Arc::from(preformatted),
            ..self.clone()
        })
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        if name.is_empty() {
            return Arc::new(self.clone());
        }
        Arc::new(TextHandler {
            prefix: Arc::from(format!("{}{name}.", self.prefix)),
            ..self.clone()
        })
    }
}

pub(crate) struct BufWriter<'a>(pub(crate) &'a mut Vec<u8>);

impl fmt::Write for BufWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}
