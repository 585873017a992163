use std::sync::Arc;
use std::time::Duration;

use crate::buffer::BufferPool;
use crate::context::Context;
use crate::counter::CounterTable;
use crate::error::BuildError;
use crate::handler::Handler;
use crate::rate::RateLimiter;
use crate::record::Level;
use crate::sampling::{Sampler, SamplingBuffer};

const DEFAULT_FIRST: u64 = 100;
const DEFAULT_EVERY: u64 = 100;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BUFFER_CAPACITY: usize = 8;
const DEFAULT_POOL_SIZE: usize = 64;

/// Builder for [`RateLimiter`](crate::RateLimiter).
///
/// Created via [`RateLimiter::builder()`](crate::RateLimiter::builder).
pub struct RateLimiterBuilder {
    handler: Option<Arc<dyn Handler>>,
    interval: Duration,
    first: u64,
    every: u64,
}

impl RateLimiter {
    pub fn builder() -> RateLimiterBuilder {
        RateLimiterBuilder {
            handler: None,
            interval: DEFAULT_INTERVAL,
            first: DEFAULT_FIRST,
            every: DEFAULT_EVERY,
        }
    }
}

impl RateLimiterBuilder {
    /// Set the downstream handler that receives admitted records.
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Log the first N records with a given level and message each interval.
    /// Defaults to 100; zero is treated as the default.
    pub fn first(mut self, first: u64) -> Self {
        self.first = first;
        self
    }

    /// After the first N, log every Mth record with a given level and message
    /// each interval. Zero drops everything after the first N. Defaults to 100.
    pub fn every(mut self, every: u64) -> Self {
        self.every = every;
        self
    }

    /// Set the rate limiting window. Defaults to 1s; zero is treated as the default.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn build(self) -> Result<RateLimiter, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;

        let mut first = self.first;
        if first == 0 {
            tracing::debug!(
                default = DEFAULT_FIRST,
                "rate limiter `first` is zero, using default"
            );
            first = DEFAULT_FIRST;
        }
        let mut interval = self.interval;
        if interval.is_zero() {
            tracing::debug!(
                default = ?DEFAULT_INTERVAL,
                "rate limiter interval is zero, using default"
            );
            interval = DEFAULT_INTERVAL;
        }

        Ok(RateLimiter {
            handler,
            counters: Arc::new(CounterTable::new()),
            interval,
            first,
            every: self.every,
        })
    }
}

/// Builder for [`SamplingBuffer`](crate::SamplingBuffer).
///
/// Created via [`SamplingBuffer::builder()`](crate::SamplingBuffer::builder).
pub struct SamplingBufferBuilder {
    handler: Option<Arc<dyn Handler>>,
    sampler: Option<Sampler>,
    level: Level,
    buffer_capacity: usize,
    pool_size: usize,
}

impl SamplingBuffer {
    pub fn builder() -> SamplingBufferBuilder {
        SamplingBufferBuilder {
            handler: None,
            sampler: None,
            level: Level::ERROR,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl SamplingBufferBuilder {
    /// Set the downstream handler.
    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set the per-request sampling decision.
    /// See [`trace_sampler`](crate::trace_sampler) for one driven by the trace flags.
    pub fn sampler<F>(mut self, sampler: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.sampler = Some(Arc::new(sampler));
        self
    }

    /// Set the minimum level that is logged regardless of sampling.
    /// Defaults to [`Level::ERROR`].
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set how many records a buffer holds before spilling into its overflow
    /// list. Defaults to 8; zero is treated as the default.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set how many released buffers are kept for reuse. Defaults to 64.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    pub fn build(self) -> Result<SamplingBuffer, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;
        let sampler = self.sampler.ok_or(BuildError::MissingSampler)?;

        let mut buffer_capacity = self.buffer_capacity;
        if buffer_capacity == 0 {
            tracing::debug!(
                default = DEFAULT_BUFFER_CAPACITY,
                "buffer capacity is zero, using default"
            );
            buffer_capacity = DEFAULT_BUFFER_CAPACITY;
        }
        let mut pool_size = self.pool_size;
        if pool_size == 0 {
            tracing::debug!(
                default = DEFAULT_POOL_SIZE,
                "buffer pool size is zero, using default"
            );
            pool_size = DEFAULT_POOL_SIZE;
        }

        Ok(SamplingBuffer {
            handler,
            sampler,
            level: self.level,
            pool: Arc::new(BufferPool::new(pool_size, buffer_capacity)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextHandler;

    #[test]
    fn rate_limiter_requires_handler() {
        assert_eq!(
            RateLimiter::builder().build().err(),
            Some(BuildError::MissingHandler)
        );
    }

    #[test]
    fn rate_limiter_zero_options_use_defaults() {
        let limiter = RateLimiter::builder()
            .handler(TextHandler::builder().build())
            .first(0)
            .every(0)
            .interval(Duration::ZERO)
            .build()
            .unwrap();
        assert_eq!(limiter.first, DEFAULT_FIRST);
        assert_eq!(limiter.every, 0);
        assert_eq!(limiter.interval, DEFAULT_INTERVAL);
    }

    #[test]
    fn sampling_buffer_requires_handler_and_sampler() {
        assert_eq!(
            SamplingBuffer::builder()
                .sampler(|_: &Context| true)
                .build()
                .err(),
            Some(BuildError::MissingHandler)
        );
        assert_eq!(
            SamplingBuffer::builder()
                .handler(TextHandler::builder().build())
                .build()
                .err(),
            Some(BuildError::MissingSampler)
        );
    }

    #[test]
    fn sampling_buffer_defaults() {
        let handler = SamplingBuffer::builder()
            .handler(TextHandler::builder().build())
            .sampler(|_: &Context| false)
            .buffer_capacity(0)
            .build()
            .unwrap();
        assert_eq!(handler.level, Level::ERROR);

        let (cx, _guard) = handler.with_buffer(&Context::new());
        assert_eq!(cx.buffer().map(|b| b.capacity()), Some(DEFAULT_BUFFER_CAPACITY));
    }
}
