use std::time::Duration;

use tracing_log_gate::{
    Context, HandlerLayer, Level, RateLimiter, SamplingBuffer, TextHandler, TraceContext,
    attach_context, trace_sampler,
};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let ratio = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0.1);

    let limiter = RateLimiter::builder()
        .handler(TextHandler::builder().level(Level::DEBUG).build())
        .first(20)
        .every(50)
        .interval(Duration::from_secs(1))
        .build()
        .unwrap();
    let sampling = SamplingBuffer::builder()
        .handler(limiter)
        .sampler(trace_sampler)
        .level(Level::WARN)
        .build()
        .unwrap();

    Registry::default()
        .with(HandlerLayer::new(sampling.clone()))
        .init();

    let mut rng = fastrand::Rng::with_seed(42);
    for request in 0..200_u64 {
        let trace = TraceContext::root_with(&mut rng, ratio);
        let span = tracing::info_span!("request", request);
        let (cx, guard) = sampling.with_buffer(&Context::new().with_trace(trace));
        attach_context(&span, cx);

        span.in_scope(|| handle(&mut rng, request));
        drop(guard);
    }
}

fn handle(rng: &mut fastrand::Rng, request: u64) {
    tracing::debug!(request, "parsing request");
    let latency_ms = rng.f64() * 500.0;
    tracing::info!(latency_ms, "fetched upstream");

    if latency_ms > 450.0 {
        tracing::error!(latency_ms, "upstream too slow");
    } else if latency_ms > 300.0 {
        tracing::warn!(latency_ms, "slow request");
    }
}
