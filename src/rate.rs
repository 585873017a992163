use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use crate::context::Context;
use crate::counter::CounterTable;
use crate::error::Error;
use crate::handler::Handler;
use crate::record::{Attr, Level, Record};

/// A [`Handler`] that limits repeated records.
///
/// Within each interval, the first `first` records with a given level and
/// message pass, then every `every`th; the rest are dropped. Records are keyed
/// into a fixed counter table, so unrelated messages can occasionally share a
/// budget.
///
/// Construct via [`RateLimiter::builder()`](crate::RateLimiterBuilder).
#[derive(Clone)]
pub struct RateLimiter {
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) counters: Arc<CounterTable>,
    pub(crate) interval: Duration,
    pub(crate) first: u64,
    pub(crate) every: u64,
}

impl RateLimiter {
    fn admits(&self, record: &Record) -> bool {
        let now = record
            .time
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX));
        let interval = i64::try_from(self.interval.as_nanos()).unwrap_or(i64::MAX);

        let n = self
            .counters
            .get(record.level, &record.message)
            .increment(now, interval);
        n <= self.first || (self.every != 0 && (n - self.first) % self.every == 0)
    }

    fn wrap(&self, handler: Arc<dyn Handler>) -> Arc<dyn Handler> {
        Arc::new(RateLimiter {
            handler,
            counters: self.counters.clone(),
            ..*self
        })
    }
}

impl Handler for RateLimiter {
    fn enabled(&self, cx: &Context, level: Level) -> bool {
        self.handler.enabled(cx, level)
    }

    fn handle(&self, cx: &Context, record: Record) -> Result<(), Error> {
        if !self.admits(&record) {
            return Ok(());
        }
        self.handler.handle(cx, record)
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Arc<dyn Handler> {
        self.wrap(self.handler.with_attrs(attrs))
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        self.wrap(self.handler.with_group(name))
    }
}
