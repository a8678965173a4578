//! Benchmarks for requirement graph traversal.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;

use stepflow::prelude::*;

/// Ten pipes of five chained steps, each pipe's root requiring the
/// previous pipe's last step.
fn chained_pipeline() -> (Pipeline, Arc<Step>) {
    let pipeline = Pipeline::new("bench");
    let store: Arc<dyn ArtifactStore> = Arc::new(MemoryStore::new());
    let mut last = None;
    for p in 0..10 {
        let pipe_name = format!("P{p}");
        let mut builder = PipeBuilder::new(&pipe_name).store(Arc::clone(&store));
        for s in 0..5 {
            let mut def = StepDef::new(format!("s{s}"), |_, _, _| Ok(json!(null)));
            if s > 0 {
                def = def.requires(format!("{pipe_name}.s{}", s - 1));
            } else if p > 0 {
                def = def.requires(format!("P{}.s4", p - 1));
            }
            builder = builder.step(def);
        }
        let pipe = pipeline
            .register_pipe(builder)
            .unwrap_or_else(|err| panic!("bench pipe: {err}"));
        last = pipe.step("s4");
    }
    let last = last.unwrap_or_else(|| panic!("bench pipeline has no steps"));
    (pipeline, last)
}

fn graph_benchmark(c: &mut Criterion) {
    let (pipeline, last) = chained_pipeline();
    pipeline
        .resolve()
        .unwrap_or_else(|err| panic!("bench resolve: {err}"));

    c.bench_function("requirement_stack", |b| {
        b.iter(|| black_box(last.requirement_stack().map(|stack| stack.len())))
    });

    c.bench_function("get_level", |b| {
        b.iter(|| black_box(last.get_level(false)))
    });

    c.bench_function("get_level_selfish", |b| {
        b.iter(|| black_box(last.get_level(true)))
    });

    c.bench_function("graph", |b| {
        b.iter(|| black_box(pipeline.graph().map(|(steps, _)| steps.len())))
    });
}

criterion_group!(benches, graph_benchmark);
criterion_main!(benches);
