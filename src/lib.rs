//! Admission control for structured logs.
//!
//! Two [`Handler`]s decide, per record, whether it is written now, held back,
//! or dropped:
//!
//! - [`RateLimiter`] logs the first N records with a given level and message
//!   each interval, then every Mth. Counters live in a fixed, hash-sharded
//!   table and are updated with atomics only, so it is optimised for speed over
//!   absolute precision: under load a window may be slightly over-sampled.
//! - [`SamplingBuffer`] drops low-level records of unsampled requests. Inside
//!   a buffer scope they are deferred instead, and emitted in order as soon as
//!   the request logs something at the minimum level, so an error arrives with
//!   the context that led up to it.
//!
//! Both wrap a downstream handler and compose into a chain. [`HandlerLayer`]
//! plugs a chain into `tracing`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tracing_log_gate::{
//!     Context, Level, Logger, RateLimiter, SamplingBuffer, TextHandler, trace_sampler,
//! };
//!
//! let limiter = RateLimiter::builder()
//!     .handler(TextHandler::builder().build())
//!     .first(10)
//!     .every(100)
//!     .interval(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//! let sampling = SamplingBuffer::builder()
//!     .handler(limiter)
//!     .sampler(trace_sampler)
//!     .level(Level::WARN)
//!     .build()
//!     .unwrap();
//! let logger = Logger::new(sampling.clone());
//!
//! let (cx, guard) = sampling.with_buffer(&Context::new());
//! logger.info(&cx, "request started").unwrap();
//! guard.release();
//! ```

mod buffer;
mod builder;
mod context;
mod counter;
mod error;
mod handler;
mod layer;
mod logger;
mod rate;
mod record;
mod sampling;
mod text;
mod trace;

pub use buffer::{BufferGuard, Entry, RecordBuffer};
pub use builder::{RateLimiterBuilder, SamplingBufferBuilder};
pub use context::Context;
pub use error::{BuildError, Error};
pub use handler::Handler;
pub use layer::{HandlerLayer, attach_context};
pub use logger::Logger;
pub use rate::RateLimiter;
pub use record::{Attr, Level, Record, Value};
pub use sampling::SamplingBuffer;
pub use text::{TextHandler, TextHandlerBuilder};
pub use trace::{ParseTraceError, TraceContext, trace_sampler};
