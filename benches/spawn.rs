use criterion::*;
use std::hint::black_box;

mod common;
use common::*;

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("add_entities_10k", |b| {
        b.iter_batched(
            || make_manager(1),
            |mut manager| {
                for _ in 0..ENTITIES_SMALL {
                    black_box(manager.add_entity());
                }
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("populate_three_components_10k", |b| {
        b.iter_batched(
            || make_manager(1),
            |mut manager| {
                populate(&mut manager, ENTITIES_SMALL);
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("delete_and_recycle_10k", |b| {
        b.iter_batched(
            || {
                let mut manager = make_manager(1);
                populate(&mut manager, ENTITIES_SMALL);
                manager
            },
            |mut manager| {
                for id in 0..ENTITIES_SMALL {
                    manager.delete_entity(id);
                }
                for _ in 0..ENTITIES_SMALL {
                    black_box(manager.add_entity());
                }
                black_box(manager);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
