use std::fmt;
use std::time::SystemTime;

use tracing::field::{Field, Visit};
use tracing::{Event, Span, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context as LayerContext;
use tracing_subscriber::registry::{LookupSpan, Registry};

use crate::context::Context;
use crate::handler::Handler;
use crate::record::{Attr, Level, Record, Value};

/// A [`tracing_subscriber::Layer`] that feeds `tracing` events into a handler chain.
///
/// Each event becomes a [`Record`]: the `message` field is the message and the
/// remaining fields are attributes. The [`Context`] is taken from the nearest
/// enclosing span that had one attached with [`attach_context`]; events outside
/// such spans use an empty context.
///
/// ```
/// use tracing_subscriber::{Registry, layer::SubscriberExt};
/// use tracing_log_gate::{Context, HandlerLayer, SamplingBuffer, TextHandler, attach_context};
///
/// let sampling = SamplingBuffer::builder()
///     .handler(TextHandler::builder().build())
///     .sampler(|_: &Context| false)
///     .build()
///     .unwrap();
/// let subscriber = Registry::default().with(HandlerLayer::new(sampling.clone()));
///
/// tracing::subscriber::with_default(subscriber, || {
///     let span = tracing::info_span!("request");
///     let (cx, _guard) = sampling.with_buffer(&Context::new());
///     attach_context(&span, cx);
///     let _entered = span.enter();
///     tracing::info!("deferred until an error is logged");
/// });
/// ```
pub struct HandlerLayer<H> {
    handler: H,
}

impl<H: Handler> HandlerLayer<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

/// Attach `cx` to `span`, so events inside it are handled with that context.
///
/// Returns `false` if the span is disabled or its subscriber is not built on a
/// [`Registry`].
pub fn attach_context(span: &Span, cx: Context) -> bool {
    span.with_subscriber(|(id, dispatch)| {
        let Some(registry) = dispatch.downcast_ref::<Registry>() else {
            return false;
        };
        let Some(span) = registry.span(id) else {
            return false;
        };
        span.extensions_mut().replace(cx);
        true
    })
    .unwrap_or(false)
}

impl<S, H> Layer<S> for HandlerLayer<H>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    H: Handler + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let level = Level::from(*event.metadata().level());
        let cx = ctx
            .event_scope(event)
            .and_then(|scope| {
                scope
                    .into_iter()
                    .find_map(|span| span.extensions().get::<Context>().cloned())
            })
            .unwrap_or_default();

        if !self.handler.enabled(&cx, level) {
            return;
        }

        let mut visitor = RecordVisitor {
            message: String::new(),
            attrs: Vec::new(),
        };
        event.record(&mut visitor);

        let record = Record {
            level,
            message: visitor.message.into(),
            time: SystemTime::now(),
            attrs: visitor.attrs,
        };
        let _ = self.handler.handle(&cx, record);
    }
}

struct RecordVisitor {
    message: String,
    attrs: Vec<Attr>,
}

impl RecordVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        self.attrs.push(Attr::new(field.name(), value));
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.push(field, Value::from(value.to_owned()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push(field, Value::from(format!("{value:?}")));
        }
    }
}
