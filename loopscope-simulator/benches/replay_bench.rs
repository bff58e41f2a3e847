#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};

use loopscope_core::prelude::Environment;
use loopscope_simulator::{replay, Catalog};

/// Full-scenario replay throughput over the built-in catalog.
fn bench_replay(c: &mut Criterion) {
    let catalog = Catalog::builtin().expect("built-in catalog loads");
    let mut group = c.benchmark_group("replay");

    for id in ["hello-sync", "mixed-async", "promise-race-condition"] {
        let scenario = catalog.get(id).expect("built-in scenario");
        group.bench_function(id, |b| {
            b.iter(|| black_box(replay(scenario.clone(), Environment::Browser, None)))
        });
    }

    group.bench_function("whole_catalog", |b| {
        b.iter(|| {
            for scenario in catalog.iter() {
                black_box(replay(scenario.clone(), Environment::Browser, None));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_replay);
criterion_main!(benches);
