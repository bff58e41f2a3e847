#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use loopscope_core::prelude::*;

fn enqueue_then_drain(count: usize) -> Vec<ScenarioAction> {
    let mut actions = Vec::with_capacity(count * 3);
    for i in 0..count {
        actions.push(ScenarioAction::EnqueueMicrotask {
            task: TaskTemplate::new(TaskKind::Promise, format!("then #{i}")),
        });
    }
    for _ in 0..count {
        actions.push(ScenarioAction::DequeueAndRun {
            queue: QueueSelector::Microtask,
        });
        actions.push(ScenarioAction::PopStack);
    }
    actions
}

fn bench_executor_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("executor_apply");

    for count in [16, 256, 4096] {
        let actions = enqueue_then_drain(count);
        group.throughput(criterion::Throughput::Elements(actions.len() as u64));
        group.bench_function(format!("microtasks_{}", count), |b| {
            b.iter(|| {
                let mut executor = Executor::default();
                let mut state = RuntimeState::new(Environment::Browser, 1.0);
                for action in &actions {
                    state = executor.apply(state, action);
                }
                black_box(state)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_executor_apply);
criterion_main!(benches);
