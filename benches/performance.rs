//! Benchmarks for the hot paths of the step loop: event append/view
//! derivation and history condensation, the two operations every turn pays
//! for regardless of network latency.

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::Value;

use open_agent::{
    Condenser, Event, EventStore, LlmSummarizingCondenser, NoOpCondenser, Result, Summarizer,
};

struct EchoSummarizer;

#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, window_text: &str) -> Result<String> {
        Ok(format!("summary of {} chars", window_text.len()))
    }
}

fn filled_store(n: usize) -> EventStore {
    let mut store = EventStore::new();
    for i in 0..n {
        store.append(Event::user_message(format!("turn {i}: some representative message text"))).unwrap();
    }
    store
}

fn bench_event_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append");
    for size in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut store = EventStore::new();
                for i in 0..size {
                    store.append(Event::user_message(format!("turn {i}"))).unwrap();
                }
                criterion::black_box(store.len());
            });
        });
    }
    group.finish();
}

fn bench_view_for_llm(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_for_llm");
    for size in [100usize, 1000, 5000] {
        let store = filled_store(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| criterion::black_box(store.view_for_llm()));
        });
    }
    group.finish();
}

fn bench_condensation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("condensation");

    group.bench_function("noop_condenser_on_large_log", |b| {
        b.iter_batched(
            || filled_store(2000),
            |mut store| rt.block_on(async { NoOpCondenser.condense(&mut store).await.unwrap() }),
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function("llm_summarizing_condenser_one_pass", |b| {
        b.iter_batched(
            || (filled_store(200), LlmSummarizingCondenser::new(50, 10, EchoSummarizer)),
            |(mut store, condenser)| rt.block_on(async { condenser.condense(&mut store).await.unwrap() }),
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_event_append, bench_view_for_llm, bench_condensation);
criterion_main!(benches);
