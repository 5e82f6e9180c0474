//! Correlation engine benchmark suite.
//!
//! Measures the per-event cost on the receive path:
//! - Decoding message batches of different sizes
//! - Dispatching pushes to hooks
//! - Resolving identity waiters
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use fakeweb::protocol::{decode_message, encode_events};
use fakeweb::transport::Correlator;
use fakeweb::{Event, EventType};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BATCH_SIZES: &[usize] = &[1, 16, 256];
const HOOK_COUNTS: &[usize] = &[0, 1, 8];

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &size in BATCH_SIZES {
        let events: Vec<Event> = (0..size)
            .map(|i| Event::command(EventType::NetworkLog, format!("GET https://example.com/{i}")))
            .collect();
        let text = encode_events(&events).expect("encode");

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("batch", size), &text, |b, text| {
            b.iter(|| decode_message(black_box(text)).expect("decode"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Hook Dispatch
// ============================================================================

fn bench_hook_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("hook_dispatch");
    let event = Event::command(EventType::NetworkLog, "GET https://example.com/");

    for &hooks in HOOK_COUNTS {
        let correlator = Correlator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..hooks {
            let calls = Arc::clone(&calls);
            correlator.add_hook(EventType::NetworkLog, move |content| {
                calls.fetch_add(content.len(), Ordering::Relaxed);
            });
        }

        group.bench_with_input(BenchmarkId::new("hooks", hooks), &event, |b, event| {
            b.iter(|| correlator.dispatch(black_box(event)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Identity Waiters
// ============================================================================

fn bench_response_roundtrip(c: &mut Criterion) {
    let correlator = Correlator::new();

    c.bench_function("register_and_resolve", |b| {
        b.iter(|| {
            let command = Event::command(EventType::EvalJs, "1+1");
            let pending = correlator
                .register_response(command.id.clone())
                .expect("register");
            let reply = Event::reply_to(&command, EventType::EvalJsCallback, "2");
            let dispatched = correlator.dispatch(&reply);
            black_box((pending, dispatched))
        });
    });

    c.bench_function("dispatch_unmatched_reply", |b| {
        let command = Event::command(EventType::EvalJs, "1+1");
        let reply = Event::reply_to(&command, EventType::EvalJsCallback, "2");
        b.iter(|| correlator.dispatch(black_box(&reply)));
    });
}

criterion_group!(
    benches,
    bench_decode,
    bench_hook_dispatch,
    bench_response_roundtrip
);
criterion_main!(benches);
