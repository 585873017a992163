use std::hint::black_box;
use std::io;
use std::sync::Barrier;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use tracing_log_gate::{Context, Logger, RateLimiter, SamplingBuffer, TextHandler};

fn sink() -> TextHandler<fn() -> io::Sink> {
    TextHandler::builder()
        .writer(io::sink as fn() -> io::Sink)
        .without_time()
        .build()
}

fn rate_limited(first: u64, every: u64) -> Logger {
    let limiter = RateLimiter::builder()
        .handler(sink())
        .first(first)
        .every(every)
        .build()
        .unwrap();
    Logger::new(limiter)
}

fn sampled(sampled: bool) -> SamplingBuffer {
    SamplingBuffer::builder()
        .handler(sink())
        .sampler(move |_: &Context| sampled)
        .build()
        .unwrap()
}

fn bench_threaded(
    threads: usize,
    b: &mut criterion::Bencher,
    f: impl Fn() + Sync,
) {
    b.iter_custom(|iters| {
        let barrier = Barrier::new(threads);
        let per_thread = iters / threads as u64;
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        let start = std::time::Instant::now();
                        for _ in 0..per_thread {
                            f();
                        }
                        start.elapsed()
                    })
                })
                .collect();
            let total: Duration = handles.into_iter().map(|h| h.join().unwrap()).sum();
            total / threads as u32
        })
    });
}

fn bench_rate_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate");
    let cx = Context::new();

    let logger = rate_limited(100, 100);
    group.bench_function("mostly_dropped", |b| {
        b.iter(|| logger.info(&cx, black_box("benchmark event")))
    });

    let logger = rate_limited(u64::MAX, 1);
    group.bench_function("all_admitted", |b| {
        b.iter(|| logger.info(&cx, black_box("benchmark event")))
    });

    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    for threads in [1, 2, 4, 8] {
        let logger = rate_limited(100, 100);
        let cx = Context::new();
        group.bench_with_input(
            BenchmarkId::new("same_message", threads),
            &threads,
            |b, &threads| {
                bench_threaded(threads, b, || {
                    let _ = logger.info(&cx, "benchmark event");
                })
            },
        );
    }
    group.finish();
}

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");

    let handler = sampled(true);
    let logger = Logger::new(handler.clone());
    let cx = Context::new();
    group.bench_function("sampled", |b| {
        b.iter(|| logger.info(&cx, black_box("benchmark event")))
    });

    let handler = sampled(false);
    let logger = Logger::new(handler.clone());
    group.bench_function("unsampled_unbuffered", |b| {
        b.iter(|| logger.info(&cx, black_box("benchmark event")))
    });

    // One scope per request: a handful of deferred records, then an error.
    group.bench_function("buffered_request", |b| {
        b.iter(|| {
            let (cx, guard) = handler.with_buffer(&Context::new());
            for _ in 0..black_box(10) {
                let _ = logger.info(&cx, "step");
            }
            let _ = logger.error(&cx, "failed");
            guard.release();
        })
    });

    group.finish();
}

criterion_group!(benches, bench_rate_limiter, bench_contention, bench_sampling);
criterion_main!(benches);
