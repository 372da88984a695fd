//! # Process Benchmarks
//!
//! Performance benchmarks for stepwise-core serialization and execution.
//!
//! Run with: `cargo bench -p stepwise-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use stepwise_core::{
    Chapter, ChapterData, Guid, KindRegistry, Process, ProcessData, ProcessMetrics, Runner, Step,
    StepData, Transition, TransitionData, process_from_str, process_to_string, validate_process,
};

/// Create a process with one chapter of N steps chained in order.
fn create_linear_process(size: usize) -> Process {
    let mut chapter = ChapterData::new(Guid::from_u128(u128::MAX));
    for i in 0..size {
        let mut data = StepData::new(Guid::from_u128(i as u128));
        if i + 1 < size {
            data = data.with_transition(Transition::new(
                "next",
                TransitionData::to(Guid::from_u128(i as u128 + 1)),
            ));
        }
        chapter.add_step(Step::new(format!("step-{}", i), data));
    }
    Process::new("bench", ProcessData::new().with_chapter(Chapter::new("main", chapter)))
}

/// Same chain, with every step also looping back to the first one.
fn create_looping_process(size: usize) -> Process {
    let mut chapter = ChapterData::new(Guid::from_u128(u128::MAX));
    for i in 0..size {
        let mut data = StepData::new(Guid::from_u128(i as u128));
        if i + 1 < size {
            data = data.with_transition(Transition::new(
                "next",
                TransitionData::to(Guid::from_u128(i as u128 + 1)),
            ));
        }
        data = data.with_transition(Transition::new("restart", TransitionData::to(Guid::from_u128(0))));
        chapter.add_step(Step::new(format!("step-{}", i), data));
    }
    Process::new("bench", ProcessData::new().with_chapter(Chapter::new("main", chapter)))
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for size in [100, 1000, 5000].iter() {
        let process = create_looping_process(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(process_to_string(&process)));
        });
    }

    group.finish();
}

fn bench_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("deserialize");
    let registry = KindRegistry::default();

    for size in [100, 1000, 5000].iter() {
        let text = process_to_string(&create_looping_process(*size)).expect("save");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(process_from_str(&text, &registry)));
        });
    }

    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_until_complete");

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut runner = Runner::new(create_linear_process(size));
                black_box(runner.run_until_complete(Duration::from_millis(100), 100_000))
            });
        });
    }

    group.finish();
}

fn bench_fast_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("fast_forward");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut runner = Runner::new(create_looping_process(size));
                black_box(runner.fast_forward())
            });
        });
    }

    group.finish();
}

fn bench_inspect(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect");

    for size in [100, 1000].iter() {
        let process = create_looping_process(*size);

        group.bench_with_input(BenchmarkId::new("validate", size), size, |b, _| {
            b.iter(|| black_box(validate_process(&process)));
        });

        group.bench_with_input(BenchmarkId::new("metrics", size), size, |b, _| {
            b.iter(|| black_box(ProcessMetrics::from_process(&process)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_serialize,
    bench_deserialize,
    bench_run,
    bench_fast_forward,
    bench_inspect,
);

criterion_main!(benches);
