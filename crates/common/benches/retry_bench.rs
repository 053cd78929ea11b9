//! Retry template benchmarks
//!
//! Measures the orchestration overhead of the attempt loop and the cost of
//! backoff delay calculation.
//!
//! Run with: `cargo bench --bench retry_bench -p cadence-common --features runtime`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_common::retry::{
    classify_error, BackoffStrategy, Jitter, NoRetryPolicyFactory, RetryCallback, RetryContext,
    RetryTemplate, SimpleRetryPolicyFactory,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Builder as RuntimeBuilder;

struct Succeeds;

#[async_trait]
impl RetryCallback for Succeeds {
    async fn do_work(&self, context: &mut RetryContext) -> anyhow::Result<()> {
        context.add_return_message("ok");
        Ok(())
    }

    fn work_description(&self) -> String {
        "bench".to_string()
    }
}

struct FailsFirst {
    failures: u32,
    calls: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl RetryCallback for FailsFirst {
    async fn do_work(&self, _context: &mut RetryContext) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if call % (self.failures + 1) < self.failures {
            anyhow::bail!("transient");
        }
        Ok(())
    }

    fn work_description(&self) -> String {
        "bench-failing".to_string()
    }
}

fn bench_template_execute(c: &mut Criterion) {
    let runtime = RuntimeBuilder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime for benchmarks");
    let mut group = c.benchmark_group("retry_template_execute");

    group.bench_function("first_attempt_success", |b| {
        let template = RetryTemplate::new(Arc::new(NoRetryPolicyFactory));
        b.iter(|| {
            let context = runtime.block_on(template.execute(&Succeeds));
            black_box(context.is_ok())
        });
    });

    for failures in [1u32, 3, 5] {
        group.bench_with_input(BenchmarkId::new("recover_after", failures), &failures, |b, &n| {
            let factory = SimpleRetryPolicyFactory::new(n as i32, Duration::ZERO)
                .expect("valid simple policy");
            let template = RetryTemplate::new(Arc::new(factory));
            let callback = FailsFirst { failures: n, calls: Default::default() };
            b.iter(|| black_box(runtime.block_on(template.execute(&callback)).is_ok()));
        });
    }

    group.finish();
}

fn bench_backoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("backoff");
    let exponential = BackoffStrategy::Exponential {
        initial_delay: Duration::from_millis(100),
        base: 2.0,
        max_delay: Duration::from_secs(30),
    };

    group.bench_function("exponential_delay", |b| {
        b.iter(|| {
            for attempt in 0..16 {
                black_box(exponential.calculate_delay(black_box(attempt)));
            }
        });
    });

    group.bench_function("equal_jitter", |b| {
        b.iter(|| black_box(Jitter::Equal.apply(black_box(Duration::from_millis(800)))));
    });

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let error = anyhow::anyhow!("connection refused").context("connect").context("poll");
    c.bench_function("classify_error_chain", |b| b.iter(|| black_box(classify_error(&error))));
}

criterion_group!(benches, bench_template_execute, bench_backoff, bench_classify);
criterion_main!(benches);
